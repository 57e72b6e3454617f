// ═══════════════════════════════════════════════════════════════════
// Storage Tests — RateStore, history log, PortfolioStore, UserStore
// ═══════════════════════════════════════════════════════════════════

use chrono::{TimeZone, Utc};
use std::sync::Barrier;

use valuta_core::errors::CoreError;
use valuta_core::models::portfolio::Portfolio;
use valuta_core::models::rate::{RateEntry, RatePair, RateSnapshot};
use valuta_core::models::settings::Settings;
use valuta_core::models::wallet::Wallet;
use valuta_core::storage::credentials::KdfParams;
use valuta_core::storage::portfolio_store::PortfolioStore;
use valuta_core::storage::rate_store::RateStore;
use valuta_core::storage::user_store::UserStore;

/// Cheap Argon2 parameters so tests stay fast.
fn fast_kdf() -> KdfParams {
    KdfParams {
        memory_cost: 1024,
        time_cost: 1,
        parallelism: 1,
    }
}

fn sample_snapshot(source: Option<&str>) -> RateSnapshot {
    let at = Utc.with_ymd_and_hms(2025, 10, 10, 12, 0, 0).unwrap();
    let mut s = RateSnapshot::new();
    s.insert(&RatePair::new("BTC", "USD"), RateEntry { rate: 59_337.21, updated_at: at });
    s.insert(&RatePair::new("EUR", "USD"), RateEntry { rate: 1.0786, updated_at: at });
    s.source = source.map(str::to_string);
    s.last_refresh = Some(at);
    s
}

// ═══════════════════════════════════════════════════════════════════
// RateStore
// ═══════════════════════════════════════════════════════════════════

mod rate_store {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> RateStore {
        RateStore::from_settings(&Settings::with_data_dir(dir.path()))
    }

    #[test]
    fn missing_file_is_empty_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let snap = store_in(&dir).load().unwrap();
        assert!(snap.is_empty());
        assert_eq!(snap.pair_count(), 0);
    }

    #[test]
    fn save_then_load() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let snap = sample_snapshot(Some("CoinGecko, ExchangeRate-API"));
        store.save(&snap).unwrap();
        assert_eq!(store.load().unwrap(), snap);
    }

    #[test]
    fn file_layout_has_pairs_at_top_level() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&sample_snapshot(Some("CoinGecko"))).unwrap();

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(store.rates_path()).unwrap()).unwrap();
        assert_eq!(raw["BTC_USD"]["rate"], 59_337.21);
        assert!(raw["BTC_USD"]["updated_at"].is_string());
        assert_eq!(raw["source"], "CoinGecko");
        assert!(raw["last_refresh"].is_string());
    }

    #[test]
    fn corrupt_file_is_reported() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        std::fs::write(store.rates_path(), "{ truncated").unwrap();
        assert!(matches!(store.load(), Err(CoreError::CorruptSnapshot(_))));
    }

    #[test]
    fn save_replaces_wholesale() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.save(&sample_snapshot(None)).unwrap();

        let mut smaller = RateSnapshot::new();
        let at = Utc::now();
        smaller.insert(&RatePair::new("ETH", "USD"), RateEntry { rate: 3720.0, updated_at: at });
        smaller.last_refresh = Some(at);
        store.save(&smaller).unwrap();

        let loaded = store.load().unwrap();
        assert_eq!(loaded.pair_count(), 1);
        assert!(loaded.rates.contains_key("ETH_USD"));
    }
}

// ═══════════════════════════════════════════════════════════════════
// History log
// ═══════════════════════════════════════════════════════════════════

mod history {
    use super::*;

    #[test]
    fn each_save_appends_one_record_per_pair() {
        let dir = tempfile::tempdir().unwrap();
        let store = RateStore::from_settings(&Settings::with_data_dir(dir.path()));
        store.save(&sample_snapshot(Some("CoinGecko"))).unwrap();
        store.save(&sample_snapshot(Some("CoinGecko"))).unwrap();

        let history = store.history().unwrap();
        assert_eq!(history.len(), 4);
        let btc = history.iter().find(|r| r.from_currency == "BTC").unwrap();
        assert_eq!(btc.to_currency, "USD");
        assert_eq!(btc.rate, 59_337.21);
        assert_eq!(btc.source, "CoinGecko");
        assert_eq!(btc.timestamp, Utc.with_ymd_and_hms(2025, 10, 10, 12, 0, 0).unwrap());
    }

    #[test]
    fn ids_are_unique() {
        let dir = tempfile::tempdir().unwrap();
        let store = RateStore::from_settings(&Settings::with_data_dir(dir.path()));
        store.save(&sample_snapshot(None)).unwrap();
        store.save(&sample_snapshot(None)).unwrap();
        let history = store.history().unwrap();
        let mut ids: Vec<_> = history.iter().map(|r| r.id.clone()).collect();
        ids.sort();
        ids.dedup();
        assert_eq!(ids.len(), history.len());
        assert!(history.iter().all(|r| r.source == "ParserService"));
    }

    #[test]
    fn unreadable_history_does_not_block_save() {
        let dir = tempfile::tempdir().unwrap();
        let store = RateStore::from_settings(&Settings::with_data_dir(dir.path()));
        std::fs::write(store.history_path(), "garbage").unwrap();
        store.save(&sample_snapshot(None)).unwrap();
        assert_eq!(store.history().unwrap().len(), 2);
    }

    #[test]
    fn failed_history_write_still_saves_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let store = RateStore::from_settings(&Settings::with_data_dir(dir.path()));
        // A directory where the log should be makes every history write fail.
        std::fs::create_dir(store.history_path()).unwrap();

        let snap = sample_snapshot(Some("CoinGecko"));
        store.save(&snap).unwrap();
        assert_eq!(store.load().unwrap(), snap);
    }

    #[test]
    fn concurrent_saves_append_every_record() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path());
        let barrier = Barrier::new(16);

        std::thread::scope(|s| {
            for i in 0..16 {
                let (settings, barrier) = (&settings, &barrier);
                s.spawn(move || {
                    let mut snap = RateSnapshot::new();
                    let at = Utc::now();
                    snap.insert(
                        &RatePair::new("BTC", "USD"),
                        RateEntry { rate: 50_000.0 + i as f64, updated_at: at },
                    );
                    snap.last_refresh = Some(at);
                    barrier.wait();
                    RateStore::from_settings(settings).save(&snap).unwrap();
                });
            }
        });

        let store = RateStore::from_settings(&settings);
        let history = store.history().unwrap();
        assert_eq!(history.len(), 16);
        let mut rates: Vec<f64> = history.iter().map(|r| r.rate - 50_000.0).collect();
        rates.sort_by(f64::total_cmp);
        assert_eq!(rates, (0..16).map(f64::from).collect::<Vec<_>>());
        assert_eq!(store.load().unwrap().pair_count(), 1);
    }
}

// ═══════════════════════════════════════════════════════════════════
// PortfolioStore
// ═══════════════════════════════════════════════════════════════════

mod portfolio_store {
    use super::*;

    #[test]
    fn absent_user_loads_empty() {
        let dir = tempfile::tempdir().unwrap();
        let store = PortfolioStore::from_settings(&Settings::with_data_dir(dir.path()));
        let p = store.load(42).unwrap();
        assert_eq!(p.user_id(), 42);
        assert!(p.wallets().is_empty());
    }

    #[test]
    fn save_upserts_per_user() {
        let dir = tempfile::tempdir().unwrap();
        let store = PortfolioStore::from_settings(&Settings::with_data_dir(dir.path()));

        let mut alice = Portfolio::from_wallets(1, [Wallet::with_balance("USD", 100.0).unwrap()]);
        let bob = Portfolio::from_wallets(2, [Wallet::with_balance("BTC", 0.5).unwrap()]);
        store.save(&alice).unwrap();
        store.save(&bob).unwrap();

        alice.wallet_or_create("ETH").deposit(2.0).unwrap();
        store.save(&alice).unwrap();

        assert_eq!(store.load(1).unwrap(), alice);
        assert_eq!(store.load(2).unwrap(), bob);

        let raw: serde_json::Value =
            serde_json::from_slice(&std::fs::read(dir.path().join("portfolios.json")).unwrap())
                .unwrap();
        assert_eq!(raw.as_array().unwrap().len(), 2);
        assert_eq!(raw[0]["wallets"]["ETH"]["balance"], 2.0);
    }

    #[test]
    fn negative_balance_on_disk_is_rejected() {
        let dir = tempfile::tempdir().unwrap();
        std::fs::write(
            dir.path().join("portfolios.json"),
            r#"[{"user_id": 1, "wallets": {"USD": {"balance": -5.0}}}]"#,
        )
        .unwrap();
        let store = PortfolioStore::from_settings(&Settings::with_data_dir(dir.path()));
        assert!(matches!(store.load(1), Err(CoreError::Validation(_))));
    }

    #[test]
    fn concurrent_saves_keep_every_user() {
        let dir = tempfile::tempdir().unwrap();
        let settings = Settings::with_data_dir(dir.path());

        for round in 0..5u64 {
            let barrier = Barrier::new(16);
            std::thread::scope(|s| {
                for uid in 1..=16u64 {
                    let (settings, barrier) = (&settings, &barrier);
                    s.spawn(move || {
                        let balance = (round * 100 + uid) as f64;
                        let p = Portfolio::from_wallets(
                            uid,
                            [Wallet::with_balance("USD", balance).unwrap()],
                        );
                        barrier.wait();
                        PortfolioStore::from_settings(settings).save(&p).unwrap();
                    });
                }
            });

            let store = PortfolioStore::from_settings(&settings);
            for uid in 1..=16u64 {
                let usd = store.load(uid).unwrap().get_wallet("USD").unwrap().balance();
                assert_eq!(usd, (round * 100 + uid) as f64, "user {uid} in round {round}");
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════════
// UserStore
// ═══════════════════════════════════════════════════════════════════

mod user_store {
    use super::*;

    fn store_in(dir: &tempfile::TempDir) -> UserStore {
        UserStore::from_settings(&Settings::with_data_dir(dir.path())).with_kdf_params(fast_kdf())
    }

    #[test]
    fn ids_increment_from_one() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        assert_eq!(store.create("alice", "secret1").unwrap().user_id, 1);
        assert_eq!(store.create("bob", "secret2").unwrap().user_id, 2);
        assert_eq!(store.all().unwrap().len(), 2);
    }

    #[test]
    fn password_is_never_stored_in_clear() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        let user = store.create("alice", "hunter22").unwrap();
        assert_eq!(user.salt.len(), 32);
        assert_eq!(user.hashed_password.len(), 64);
        let raw = std::fs::read_to_string(dir.path().join("users.json")).unwrap();
        assert!(!raw.contains("hunter22"));
    }

    #[test]
    fn duplicate_and_invalid_input() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.create("alice", "secret1").unwrap();
        assert!(matches!(store.create("alice", "other12"), Err(CoreError::UsernameTaken(_))));
        assert!(matches!(store.create("  ", "secret1"), Err(CoreError::Validation(_))));
        assert!(matches!(store.create("carol", "abc"), Err(CoreError::Validation(_))));
    }

    #[test]
    fn verify_checks_password() {
        let dir = tempfile::tempdir().unwrap();
        let store = store_in(&dir);
        store.create("alice", "secret1").unwrap();
        assert_eq!(store.verify("alice", "secret1").unwrap().username, "alice");
        assert!(matches!(store.verify("alice", "wrong!"), Err(CoreError::InvalidCredentials)));
        assert!(matches!(store.verify("nobody", "secret1"), Err(CoreError::UserNotFound(_))));
    }

    #[test]
    fn concurrent_registrations_get_distinct_ids() {
        let dir = tempfile::tempdir().unwrap();
        let barrier = Barrier::new(8);

        std::thread::scope(|s| {
            for i in 0..8 {
                let (dir, barrier) = (&dir, &barrier);
                s.spawn(move || {
                    let store = store_in(dir);
                    barrier.wait();
                    store.create(&format!("user{i}"), "secret1").unwrap();
                });
            }
        });

        let mut ids: Vec<u64> = store_in(&dir).all().unwrap().iter().map(|u| u.user_id).collect();
        ids.sort_unstable();
        assert_eq!(ids, (1..=8).collect::<Vec<_>>());
    }
}

