use chrono::{DateTime, Duration, TimeZone, Utc};
use rust_decimal::Decimal;
use serde_json::{Value, json};
use std::sync::Arc;
use stocky::api::{AppState, create_app};
use stocky::core::config::AppConfig;
use stocky::core::{FixedClock, NewReward, PriceCache, PriceEntry, RewardLedger};
use stocky::store::Stores;
use tokio::net::TcpListener;
use tokio_util::sync::CancellationToken;
use tracing::info;

mod test_utils {
    use super::*;

    pub fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 15, 12, 0, 0).unwrap()
    }

    pub struct TestApp {
        pub base_url: String,
        pub stores: Stores,
        pub client: reqwest::Client,
    }

    impl TestApp {
        pub async fn spawn() -> Self {
            let stores = Stores::memory();
            let state = AppState::new(&stores, Arc::new(FixedClock(now())));
            let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
            let addr = listener.local_addr().unwrap();
            tokio::spawn(async move {
                axum::serve(listener, create_app(state)).await.unwrap();
            });
            info!(%addr, "Test app listening");

            Self {
                base_url: format!("http://{addr}"),
                stores,
                client: reqwest::Client::new(),
            }
        }

        pub async fn get(&self, path: &str) -> (u16, Value) {
            let resp = self
                .client
                .get(format!("{}{path}", self.base_url))
                .send()
                .await
                .unwrap();
            let status = resp.status().as_u16();
            (status, resp.json().await.unwrap())
        }

        pub async fn post(&self, path: &str, body: &Value) -> (u16, Value) {
            let resp = self
                .client
                .post(format!("{}{path}", self.base_url))
                .json(body)
                .send()
                .await
                .unwrap();
            let status = resp.status().as_u16();
            (status, resp.json().await.unwrap())
        }

        pub async fn backdate_reward(&self, user: &str, symbol: &str, shares: i64, days_ago: i64) {
            self.stores
                .ledger
                .record_reward(NewReward::new(
                    user,
                    symbol,
                    Decimal::from(shares),
                    now() - Duration::days(days_ago),
                ))
                .await
                .unwrap();
        }
    }
}

use test_utils::{TestApp, now};

#[test_log::test(tokio::test)]
async fn test_health() {
    let app = TestApp::spawn().await;
    let (status, body) = app.get("/health").await;
    assert_eq!(status, 200);
    assert_eq!(body, json!({ "status": "ok" }));
}

#[test_log::test(tokio::test)]
async fn test_reward_then_duplicate_is_rejected() {
    let app = TestApp::spawn().await;
    let reward = json!({ "user_id": "U1", "stock_symbol": "AAA", "shares": 10 });

    let (status, body) = app.post("/reward", &reward).await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Reward recorded successfully");
    assert_eq!(body["reward_id"], 1);
    let reward_time: DateTime<Utc> = body["reward_time"].as_str().unwrap().parse().unwrap();
    assert_eq!(reward_time, now());

    let (status, body) = app.post("/reward", &reward).await;
    assert_eq!(status, 409);
    assert_eq!(
        body["error"],
        "Duplicate reward event — this reward already exists"
    );
}

#[test_log::test(tokio::test)]
async fn test_invalid_reward_payloads() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .post("/reward", &json!({ "user_id": "U1", "stock_symbol": "AAA" }))
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid input");

    let resp = app
        .client
        .post(format!("{}/reward", app.base_url))
        .header("content-type", "application/json")
        .body("{not json")
        .send()
        .await
        .unwrap();
    assert_eq!(resp.status().as_u16(), 400);
}

#[test_log::test(tokio::test)]
async fn test_zero_shares_and_multiplier_are_rejected() {
    let app = TestApp::spawn().await;

    let (status, body) = app
        .post(
            "/reward",
            &json!({ "user_id": "U1", "stock_symbol": "AAA", "shares": 0 }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid input");

    let (status, body) = app
        .post(
            "/stock-adjustment",
            &json!({ "stock_symbol": "AAA", "multiplier": 0, "effective_date": "2024-06-01" }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid input");

    let (_, adjustments) = app.get("/stock-adjustments").await;
    assert_eq!(adjustments["adjustments"], json!([]));
    let (_, today) = app.get("/today-stocks/U1").await;
    assert_eq!(today["rewards_today"], json!([]));
}

#[test_log::test(tokio::test)]
async fn test_out_of_range_holdings_fail_without_killing_the_connection() {
    let app = TestApp::spawn().await;
    let (status, _) = app
        .post(
            "/reward",
            &json!({ "user_id": "U9", "stock_symbol": "AAA", "shares": 1e26 }),
        )
        .await;
    assert_eq!(status, 200);

    for path in ["/portfolio/U9", "/stats/U9"] {
        let (status, body) = app.get(path).await;
        assert_eq!(status, 500, "{path}");
        assert_eq!(body["error"], "Value out of range");
    }

    let (status, _) = app.get("/health").await;
    assert_eq!(status, 200);
}

#[test_log::test(tokio::test)]
async fn test_split_applies_to_today_stats() {
    let app = TestApp::spawn().await;
    let yesterday = (now() - Duration::days(1)).date_naive().to_string();

    let (status, body) = app
        .post(
            "/stock-adjustment",
            &json!({ "stock_symbol": "AAA", "multiplier": 2.0, "effective_date": yesterday }),
        )
        .await;
    assert_eq!(status, 200);
    assert_eq!(body["message"], "Stock adjustment recorded successfully");
    assert_eq!(body["stock"], "AAA");

    let (status, _) = app
        .post(
            "/reward",
            &json!({ "user_id": "U1", "stock_symbol": "AAA", "shares": 10 }),
        )
        .await;
    assert_eq!(status, 200);

    let (status, stats) = app.get("/stats/U1").await;
    assert_eq!(status, 200);
    assert_eq!(stats["user_id"], "U1");
    assert_eq!(stats["today_rewards"][0]["stock_symbol"], "AAA");
    assert_eq!(stats["today_rewards"][0]["total_shares"], 20.0);
    assert_eq!(stats["portfolio_inr_value"], 26000.0);

    let (_, today) = app.get("/today-stocks/U1").await;
    let rewards = today["rewards_today"].as_array().unwrap();
    assert_eq!(rewards.len(), 1);
    assert_eq!(rewards[0]["reward_id"], 1);
    assert_eq!(rewards[0]["shares"], 20.0);
}

#[test_log::test(tokio::test)]
async fn test_portfolio_and_history_use_cached_prices() {
    let app = TestApp::spawn().await;
    app.backdate_reward("U1", "AAA", 2, 2).await;
    app.backdate_reward("U1", "BB", 3, 1).await;
    app.stores
        .prices
        .upsert(PriceEntry {
            symbol: "AAA".to_string(),
            price: Decimal::new(150050, 2),
            updated_at: now(),
        })
        .await
        .unwrap();

    let (status, portfolio) = app.get("/portfolio/U1").await;
    assert_eq!(status, 200);
    assert_eq!(
        portfolio["portfolio"],
        json!([
            {
                "stock_symbol": "AAA",
                "total_shares": 2.0,
                "current_price": 1500.5,
                "total_value_inr": 3001.0
            },
            {
                "stock_symbol": "BB",
                "total_shares": 3.0,
                "current_price": 1000.0,
                "total_value_inr": 3000.0
            }
        ])
    );
    assert_eq!(portfolio["portfolio_total_inr"], 6001.0);

    let (status, history) = app.get("/historical-inr/U1").await;
    assert_eq!(status, 200);
    assert_eq!(
        history["historical_inr"],
        json!([
            { "date": "2024-06-13", "total_inr": 3001.0 },
            { "date": "2024-06-14", "total_inr": 3000.0 }
        ])
    );
}

#[test_log::test(tokio::test)]
async fn test_delisted_symbol_disappears_from_views() {
    let app = TestApp::spawn().await;
    app.backdate_reward("U1", "GONE", 5, 3).await;
    app.post(
        "/reward",
        &json!({ "user_id": "U1", "stock_symbol": "GONE", "shares": 1 }),
    )
    .await;
    let (status, _) = app
        .post(
            "/stock-adjustment",
            &json!({
                "stock_symbol": "GONE",
                "multiplier": 1,
                "effective_date": "2024-01-01",
                "delisted": true
            }),
        )
        .await;
    assert_eq!(status, 200);

    let (_, stats) = app.get("/stats/U1").await;
    assert_eq!(stats["today_rewards"], json!([]));
    assert_eq!(stats["portfolio_inr_value"], 0.0);
    let (_, portfolio) = app.get("/portfolio/U1").await;
    assert_eq!(portfolio["portfolio"], json!([]));
    let (_, history) = app.get("/historical-inr/U1").await;
    assert_eq!(history["historical_inr"], json!([]));
    let (_, today) = app.get("/today-stocks/U1").await;
    assert_eq!(today["rewards_today"], json!([]));

    let (_, adjustments) = app.get("/stock-adjustments").await;
    assert_eq!(
        adjustments["adjustments"],
        json!([{
            "stock_symbol": "GONE",
            "multiplier": 1.0,
            "effective_date": "2024-01-01",
            "delisted": true
        }])
    );
}

#[test_log::test(tokio::test)]
async fn test_invalid_adjustment_date_is_rejected() {
    let app = TestApp::spawn().await;
    let (status, body) = app
        .post(
            "/stock-adjustment",
            &json!({ "stock_symbol": "AAA", "multiplier": 2, "effective_date": "15-06-2024" }),
        )
        .await;
    assert_eq!(status, 400);
    assert_eq!(body["error"], "Invalid input");

    let (_, adjustments) = app.get("/stock-adjustments").await;
    assert_eq!(adjustments["adjustments"], json!([]));
}

#[test_log::test(tokio::test)]
async fn test_serve_refreshes_prices_and_shuts_down() {
    let stores = Stores::memory();
    stores
        .ledger
        .record_reward(NewReward::new("U1", "XYZ", Decimal::ONE, Utc::now()))
        .await
        .unwrap();

    let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
    let addr = listener.local_addr().unwrap();
    let shutdown = CancellationToken::new();
    let server = tokio::spawn({
        let stores = stores.clone();
        let shutdown = shutdown.clone();
        async move {
            stocky::serve(
                listener,
                stores,
                Arc::new(stocky::core::SystemClock),
                &AppConfig::default(),
                shutdown,
            )
            .await
        }
    });

    let resp = reqwest::get(format!("http://{addr}/health")).await.unwrap();
    assert_eq!(resp.status().as_u16(), 200);

    let mut price = None;
    for _ in 0..100 {
        price = stores.prices.get("XYZ").await.unwrap();
        if price.is_some() {
            break;
        }
        tokio::time::sleep(std::time::Duration::from_millis(10)).await;
    }
    let price = price.expect("refresher should price XYZ on its first tick");
    assert!(price.price >= Decimal::from(900) && price.price < Decimal::from(2500));

    shutdown.cancel();
    let result = tokio::time::timeout(std::time::Duration::from_secs(5), server)
        .await
        .expect("server should stop after cancellation")
        .unwrap();
    assert!(result.is_ok(), "serve failed with: {:?}", result.err());
}
