use gasoline_ring::{Cursor, PageRequest, RingBuffer};

#[test]
fn evicted_cursor_restarts_at_oldest_live_item() {
    let mut ring = RingBuffer::new(3);
    ring.write([1, 2, 3]);
    let cursor = ring.cursor();
    ring.write([4, 5, 6, 7]);

    assert_eq!(ring.evicted_since(&cursor), 1);
    let (items, next) = ring.read_from(&cursor);
    assert_eq!(items, vec![5, 6, 7]);
    assert_eq!(next.position, 7);
}

#[test]
fn repeated_read_without_writes_is_empty_and_stable() {
    let mut ring = RingBuffer::new(8);
    ring.write(["a", "b", "c"]);
    let (first, cursor) = ring.read_from(&Cursor::start());
    assert_eq!(first, vec!["a", "b", "c"]);

    let (second, again) = ring.read_from(&cursor);
    assert!(second.is_empty());
    assert_eq!(again.position, cursor.position);
}

#[test]
fn successive_reads_are_disjoint_and_gap_free() {
    let mut ring = RingBuffer::new(10);
    ring.write(1..=4);
    let (first, cursor) = ring.read_from(&Cursor::start());
    ring.write(5..=6);
    let (second, _) = ring.read_from(&cursor);
    assert_eq!(first, vec![1, 2, 3, 4]);
    assert_eq!(second, vec![5, 6]);
}

#[test]
fn capacity_one_keeps_cursor_stability() {
    let mut ring = RingBuffer::new(1);
    let mut cursor = ring.cursor();
    for value in 0..5 {
        ring.write_one(value);
        let (items, next) = ring.read_from(&cursor);
        assert_eq!(items, vec![value]);
        cursor = next;
        let (empty, same) = ring.read_from(&cursor);
        assert!(empty.is_empty());
        assert_eq!(same.position, cursor.position);
    }
}

#[test]
fn limited_filter_read_resumes_without_gaps() {
    let mut ring = RingBuffer::new(16);
    ring.write(1..=10);
    let even = |v: &i32| v % 2 == 0;

    let (page, cursor) = ring.read_from_with_filter(&Cursor::start(), even, 2);
    assert_eq!(page, vec![2, 4]);
    assert_eq!(cursor.position, 4);

    let (rest, end) = ring.read_from_with_filter(&cursor, even, 0);
    assert_eq!(rest, vec![6, 8, 10]);
    assert_eq!(end.position, 10);
}

#[test]
fn filter_over_all_items_honours_limit() {
    let mut ring = RingBuffer::new(16);
    ring.write(1..=6);
    assert_eq!(ring.read_all_with_filter(|v| *v > 2, 0), vec![3, 4, 5, 6]);
    assert_eq!(ring.read_all_with_filter(|v| *v > 2, 2), vec![3, 4]);
}

#[test]
fn cursor_beyond_write_counter_reads_nothing() {
    let mut ring = RingBuffer::new(4);
    ring.write([1, 2]);
    let (items, next) = ring.read_from(&Cursor::at(50));
    assert!(items.is_empty());
    assert_eq!(next.position, 2);
}

#[test]
fn page_without_cursor_keeps_newest_matches() {
    let mut ring = RingBuffer::new(16);
    ring.write(1..=9);
    let req = PageRequest {
        limit: 2,
        ..PageRequest::default()
    };
    let page = ring.page(&req, |v| v % 3 == 0);
    let values: Vec<i32> = page.items.iter().map(|e| e.item).collect();
    assert_eq!(values, vec![6, 9]);
    assert_eq!(page.items[0].position, 5);
    assert_eq!(page.cursor.position, 9);
    assert_eq!(page.evicted, 0);
}

#[test]
fn page_with_cursor_reports_eviction_and_restart() {
    let mut ring = RingBuffer::new(3);
    ring.write([1, 2]);
    let cursor = ring.cursor();
    ring.write([3, 4, 5, 6]);

    let plain = ring.page(
        &PageRequest {
            after: Some(cursor),
            ..PageRequest::default()
        },
        |_| true,
    );
    assert_eq!(plain.evicted, 1);
    assert!(!plain.restarted);
    let values: Vec<i32> = plain.items.iter().map(|e| e.item).collect();
    assert_eq!(values, vec![4, 5, 6]);

    let restarted = ring.page(
        &PageRequest {
            after: Some(cursor),
            restart_on_eviction: true,
            ..PageRequest::default()
        },
        |_| true,
    );
    assert!(restarted.restarted);
    assert_eq!(restarted.cursor.position, 6);
}

#[test]
fn page_with_cursor_and_limit_resumes() {
    let mut ring = RingBuffer::new(16);
    ring.write(1..=6);
    let first = ring.page(
        &PageRequest {
            after: Some(Cursor::start()),
            limit: 4,
            ..PageRequest::default()
        },
        |_| true,
    );
    assert_eq!(first.cursor.position, 4);
    let second = ring.page(
        &PageRequest {
            after: Some(first.cursor),
            limit: 4,
            ..PageRequest::default()
        },
        |_| true,
    );
    let values: Vec<i32> = second.items.iter().map(|e| e.item).collect();
    assert_eq!(values, vec![5, 6]);
    assert_eq!(second.cursor.position, 6);
}
