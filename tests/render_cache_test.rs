use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Barrier};
use std::time::Duration;

use pdfcrop::pdf::{
    DocumentId, DocumentSource, PageLookup, RenderConfig, RenderEvent, RenderService,
};
use pdfcrop::test_utils::test_helpers::{counting_factory, write_numbered_pdf};

const WAIT: Duration = Duration::from_secs(10);

fn service(
    pages: usize,
    cache_size: usize,
    calls: &Arc<AtomicUsize>,
    delay: Duration,
) -> RenderService {
    RenderService::with_config(
        DocumentId::next(),
        pages,
        counting_factory(calls, delay),
        RenderConfig {
            workers: 3,
            cache_size,
        },
    )
}

#[test]
fn concurrent_gets_for_one_key_render_once() {
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = Arc::new(service(4, 8, &calls, Duration::from_millis(50)));
    let key = svc.key(2, 1.5);

    let barrier = Arc::new(Barrier::new(8));
    let handles: Vec<_> = (0..8)
        .map(|_| {
            let svc = Arc::clone(&svc);
            let barrier = Arc::clone(&barrier);
            std::thread::spawn(move || {
                barrier.wait();
                svc.get(key)
            })
        })
        .collect();
    for handle in handles {
        let lookup = handle.join().unwrap();
        assert!(!matches!(lookup, PageLookup::Failed(_)));
    }

    let event = svc.events().recv_timeout(WAIT).expect("render completes");
    assert!(matches!(event, RenderEvent::Ready { .. }));
    assert!(svc.events().recv_timeout(Duration::from_millis(200)).is_err());
    assert_eq!(calls.load(Ordering::SeqCst), 1);
    assert!(svc.get(key).bitmap().is_some());
}

#[test]
fn cache_never_exceeds_capacity() {
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = service(20, 4, &calls, Duration::ZERO);

    for round in 0..2 {
        for page in 0..20 {
            let zoom = 1.0 + round as f32 * 0.5;
            if svc.get(svc.key(page, zoom)).is_pending() {
                svc.events().recv_timeout(WAIT).expect("render completes");
            }
            assert!(svc.cached_len() <= svc.capacity());
        }
    }
    assert_eq!(svc.cached_len(), 4);
    // Oldest entries went first
    assert!(svc.is_cached(&svc.key(19, 1.5)));
    assert!(!svc.is_cached(&svc.key(0, 1.5)));
}

#[test]
fn every_request_eventually_resolves() {
    let calls = Arc::new(AtomicUsize::new(0));
    let svc = service(6, 3, &calls, Duration::from_millis(5));

    let keys: Vec<_> = (0..6)
        .flat_map(|page| [svc.key(page, 1.0), svc.key(page, 2.0)])
        .collect();
    let pending = keys.iter().filter(|key| svc.get(**key).is_pending()).count();
    for _ in 0..pending {
        svc.events().recv_timeout(WAIT).expect("no request hangs");
    }
    assert_eq!(svc.in_flight_len(), 0);
}

#[test]
fn renders_a_real_document() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_numbered_pdf(&dir.path().join("ten.pdf"), 10);

    let source = DocumentSource::open(&path).unwrap();
    assert_eq!(source.page_count(), 10);
    assert_eq!(source.page_size(3).map(|s| s.width_pt), Some(103.0));

    let svc = source.render_service(RenderConfig::default());
    let key = svc.key(3, 2.0);
    assert!(svc.get(key).is_pending());

    match svc.events().recv_timeout(WAIT).expect("render completes") {
        RenderEvent::Ready { bitmap, .. } => {
            assert_eq!(bitmap.width, 206);
            assert_eq!(bitmap.height, 400);
            assert_eq!(bitmap.pixels.len(), 206 * 400 * 3);
        }
        other => panic!("unexpected event {other:?}"),
    }
}
