use super::*;

fn key(n: u64) -> Fingerprint {
    Fingerprint { hi: 0, lo: n }
}

fn render(tag: u8) -> CachedRender {
    CachedRender {
        path: PathBuf::from(format!("/tmp/{tag}.png")),
        bytes: Arc::new(vec![tag]),
        container: Container::Png,
        width: 1,
        height: 1,
    }
}

#[test]
fn get_after_put_hits() {
    let cache = ResultCache::new(4, Duration::from_secs(60));
    assert!(cache.lookup(&key(1)).is_none());
    cache.insert(key(1), render(1));
    assert_eq!(cache.lookup(&key(1)), Some(render(1)));
    assert_eq!(
        cache.stats(),
        CacheStats {
            hits: 1,
            misses: 1,
            evictions: 0
        }
    );
    assert_eq!(cache.len(), 1);
}

#[test]
fn expired_entries_are_misses_and_removed() {
    let cache = ResultCache::new(4, Duration::from_millis(20));
    cache.insert(key(1), render(1));
    std::thread::sleep(Duration::from_millis(40));
    assert!(cache.lookup(&key(1)).is_none());
    assert!(cache.is_empty());
    assert_eq!(cache.stats().evictions, 1);
}

#[test]
fn zero_ttl_never_hits() {
    let cache = ResultCache::new(4, Duration::ZERO);
    cache.insert(key(1), render(1));
    assert!(cache.lookup(&key(1)).is_none());
}

#[test]
fn full_cache_evicts_oldest_fifth() {
    let cache = ResultCache::new(10, Duration::from_secs(60));
    for i in 0..10 {
        cache.insert(key(i), render(i as u8));
        std::thread::sleep(Duration::from_millis(2));
    }
    assert_eq!(cache.len(), 10);

    cache.insert(key(100), render(100));
    assert_eq!(cache.len(), 9);
    assert!(cache.lookup(&key(0)).is_none());
    assert!(cache.lookup(&key(1)).is_none());
    assert!(cache.lookup(&key(2)).is_some());
    assert!(cache.lookup(&key(100)).is_some());
    assert_eq!(cache.stats().evictions, 2);
}

#[test]
fn small_cache_evicts_at_least_one() {
    let cache = ResultCache::new(2, Duration::from_secs(60));
    cache.insert(key(1), render(1));
    std::thread::sleep(Duration::from_millis(2));
    cache.insert(key(2), render(2));
    cache.insert(key(3), render(3));
    assert_eq!(cache.len(), 2);
    assert!(cache.lookup(&key(1)).is_none());
}

#[test]
fn replacing_a_key_does_not_evict() {
    let cache = ResultCache::new(2, Duration::from_secs(60));
    cache.insert(key(1), render(1));
    cache.insert(key(2), render(2));
    cache.insert(key(2), render(7));
    assert_eq!(cache.len(), 2);
    assert_eq!(cache.lookup(&key(2)), Some(render(7)));
    assert_eq!(cache.stats().evictions, 0);
}

#[test]
fn expired_entries_are_purged_before_evicting_live_ones() {
    let cache = ResultCache::new(2, Duration::from_millis(30));
    cache.insert(key(1), render(1));
    cache.insert(key(2), render(2));
    std::thread::sleep(Duration::from_millis(50));
    cache.insert(key(3), render(3));
    assert_eq!(cache.len(), 1);
    assert_eq!(cache.purge_expired(), 0);
}

#[test]
fn zero_capacity_disables_caching() {
    let cache = ResultCache::new(0, Duration::from_secs(60));
    cache.insert(key(1), render(1));
    assert!(cache.is_empty());
}

#[test]
fn sweeper_purges_in_background_and_stops_on_shutdown() {
    let cache = ResultCache::with_opts(CacheOpts {
        capacity: 8,
        ttl: Duration::from_millis(10),
        sweep_interval: Duration::from_millis(10),
    });
    assert!(cache.is_sweeping());
    cache.insert(key(1), render(1));
    let deadline = Instant::now() + Duration::from_secs(5);
    while !cache.is_empty() && Instant::now() < deadline {
        std::thread::sleep(Duration::from_millis(5));
    }
    assert!(cache.is_empty());

    cache.shutdown();
    assert!(!cache.is_sweeping());
    cache.shutdown();
}

#[test]
fn backend_trait_round_trips() {
    let cache = ResultCache::new(4, Duration::from_secs(60));
    let backend: &dyn CacheBackend = &cache;
    backend.put(key(5), render(5)).unwrap();
    assert_eq!(backend.get(&key(5)).unwrap(), Some(render(5)));
    assert_eq!(NoCache.get(&key(5)).unwrap(), None);
}

#[test]
fn concurrent_access_is_consistent() {
    let cache = Arc::new(ResultCache::new(64, Duration::from_secs(60)));
    let handles: Vec<_> = (0..4u64)
        .map(|t| {
            let cache = Arc::clone(&cache);
            std::thread::spawn(move || {
                for i in 0..16 {
                    let k = key(t * 100 + i);
                    cache.insert(k, render(i as u8));
                    assert!(cache.lookup(&k).is_some());
                }
            })
        })
        .collect();
    for h in handles {
        h.join().unwrap();
    }
    assert_eq!(cache.len(), 64);
}
