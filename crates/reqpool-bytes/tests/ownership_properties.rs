//! Ownership behaviour of the byte wrappers across arena lifecycles.

use reqpool_arena::Arena;
use reqpool_bytes::{ByteBuffer, ByteString, ByteView, LinkChain, SegmentedList, TableEntry};
use reqpool_test_utils::fixtures::{capped_arena, request_arena};
use reqpool_test_utils::{init_tracing, DropCounter};

#[test]
fn substring_survives_source_and_arena() {
    init_tracing();
    let sub = {
        let arena = request_arena();
        let line = ByteString::copy_str_in(&arena, "GET /index.html HTTP/1.1").unwrap();
        let path = line.substr(4, 11);
        drop(line);
        path
    };
    assert_eq!(sub, "/index.html");
    assert!(sub.is_owned());
}

#[test]
fn arena_substring_lives_in_arena() {
    let arena = request_arena();
    let line = ByteString::copy_str_in(&arena, "Host: example.org").unwrap();
    let host = line.substr_in(&arena, 6, usize::MAX).unwrap();
    assert_eq!(host, "example.org");
    assert!(arena.contains(host.as_bytes().as_ptr()));
    assert_ne!(host.as_bytes().as_ptr(), line.as_bytes()[6..].as_ptr());
}

#[test]
fn detached_string_stops_resolving_after_reset() {
    let mut arena = request_arena();
    let handle = {
        let s = ByteString::copy_str_in(&arena, "session-token").unwrap();
        s.detach(&arena).unwrap()
    };
    assert_eq!(ByteString::resolve(&mut arena, handle), "session-token");
    arena.reset();
    assert!(!ByteString::resolve(&mut arena, handle).is_valid());
}

#[test]
fn moved_out_wrappers_are_inert() {
    let arena = request_arena();
    let mut s = ByteString::copy_str_in(&arena, "x").unwrap();
    let mut b = ByteBuffer::copy_in(&arena, b"y").unwrap();
    let _s2 = s.take();
    let _b2 = b.take();
    assert!(!s.is_valid());
    assert!(!ByteView::is_valid(&b));
    assert_eq!(s.size(), 0);
    assert_eq!(b.to_string_lossy(), "");
    assert!(!s.starts_with(""));
    assert_eq!(s.find("x"), None);
}

#[test]
fn list_elements_drop_once_across_moves() {
    let counter = DropCounter::new();
    let arena = request_arena();
    let mut list = SegmentedList::new_in(&arena, 3).unwrap();
    for _ in 0..10 {
        list.push(counter.token()).unwrap();
    }
    let moved = list.take();
    let moved_again = moved;
    assert_eq!(counter.dropped(), 0);
    drop(list);
    assert_eq!(counter.dropped(), 0);
    drop(moved_again);
    assert_eq!(counter.dropped(), 10);
}

#[test]
fn response_chain_mixes_buffer_kinds() {
    let arena = request_arena();
    let body = b"<html></html>".to_vec();
    let mut chain = LinkChain::from_buffers(
        &arena,
        [
            ByteBuffer::from_str_in(&arena, "HTTP/1.1 200 OK\r\n\r\n").unwrap(),
            ByteBuffer::wrap(&body),
        ],
    )
    .unwrap();
    chain.push(&arena, ByteBuffer::heap_copy(b"\n")).unwrap();
    chain.append(ByteBuffer::terminator().into_chain(&arena).unwrap());
    assert_eq!(chain.len(), 4);
    assert!(chain.is_final());
    let kinds: Vec<(bool, bool)> = chain
        .iter()
        .map(|b| (b.is_pass_through(), b.is_owned()))
        .collect();
    assert_eq!(
        kinds,
        vec![(false, false), (true, false), (false, true), (false, false)]
    );
    assert_eq!(
        chain.collect_bytes(),
        b"HTTP/1.1 200 OK\r\n\r\n<html></html>\n".to_vec()
    );
}

#[test]
fn headers_copied_out_before_arena_goes() {
    let pairs = {
        let arena = request_arena();
        let mut headers: SegmentedList<'_, TableEntry<'_>> =
            SegmentedList::new_in(&arena, 2).unwrap();
        for (i, (k, v)) in [("Accept", "*/*"), ("Cookie", "a=1"), ("Via", "proxy")]
            .into_iter()
            .enumerate()
        {
            TableEntry::new_in_list(&mut headers)
                .unwrap()
                .set_key(&arena, k)
                .unwrap()
                .set_value(&arena, v)
                .unwrap()
                .set_hash(i + 1);
        }
        if let Some(cookie) = headers.find_if_mut(|h| h.key_matches("COOKIE")) {
            cookie.set_hash(0);
        }
        headers
            .iter()
            .filter(|h| h.is_active())
            .map(TableEntry::to_owned_pair)
            .collect::<Vec<_>>()
    };
    let names: Vec<String> = pairs.iter().map(|(k, _)| k.to_string()).collect();
    assert_eq!(names, vec!["Accept", "Via"]);
}

#[test]
fn capped_arena_reports_exhaustion() {
    let arena: Arena = capped_arena(1024, 2048);
    let mut list = SegmentedList::new_in(&arena, 2).unwrap();
    let mut pushed = 0usize;
    let err = loop {
        match list.push([0u8; 64]) {
            Ok(_) => pushed += 1,
            Err(e) => break e,
        }
    };
    assert!(err.is_allocation_failure());
    assert!(pushed > 0);
    assert_eq!(list.len(), pushed);
}
