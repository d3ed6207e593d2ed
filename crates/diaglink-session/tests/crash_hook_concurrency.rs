//! Simultaneous panics on separate threads, in a process of their own.

mod common;

use std::{
    sync::{
        Arc, Barrier,
        atomic::{AtomicUsize, Ordering},
    },
    thread,
};

use common::{SingleConnector, eventually};

static PREVIOUS_HOOK_CALLS: AtomicUsize = AtomicUsize::new(0);

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn test_concurrent_panics_are_each_reported() {
    std::panic::set_hook(Box::new(|_| {
        PREVIOUS_HOOK_CALLS.fetch_add(1, Ordering::SeqCst);
    }));

    let connector = Arc::new(SingleConnector::default());
    connector.sink.delay_ms.store(200, Ordering::SeqCst);
    let client = common::client(connector.clone());

    assert!(client.install(None));
    eventually("bind", || client.session().service_handle().is_some()).await;

    let barrier = Arc::new(Barrier::new(2));
    let workers: Vec<_> = ["worker-a", "worker-b"]
        .into_iter()
        .map(|name| {
            let barrier = Arc::clone(&barrier);
            thread::Builder::new()
                .name(name.to_string())
                .spawn(move || {
                    barrier.wait();
                    panic!("boom on {name}");
                })
                .unwrap()
        })
        .collect();
    for worker in workers {
        assert!(worker.join().is_err());
    }

    let mut threads: Vec<_> = connector
        .sink
        .reports()
        .into_iter()
        .filter_map(|report| report.thread)
        .collect();
    threads.sort();
    assert_eq!(threads, vec!["worker-a", "worker-b"]);
    assert_eq!(PREVIOUS_HOOK_CALLS.load(Ordering::SeqCst), 2);
}
