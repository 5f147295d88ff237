//! Throttled endpoint with bucket state in Redis.
//!
//! Start Redis (`docker run -d -p 6379:6379 redis:alpine`), then run
//! `LEAKY_TEST_REDIS_URL=redis://127.0.0.1/ cargo run -p leaky-redis --example throttling_api`.
//! Each client gets a burst of 10 requests and regains one per second, so the
//! last two requests from the first client are answered with 429.
use http::{Request, Response, StatusCode};
use leaky::ThrottleManager;
use leaky_redis::RedisStore;
use std::convert::Infallible;
use std::net::SocketAddr;
use tower::{service_fn, ServiceExt};

/// Charge requests to the caller's IP. A user id or API token identifies a
/// client better; addresses are shared behind NAT.
fn remote_ip_key(req: &Request<String>) -> String {
    req.extensions()
        .get::<SocketAddr>()
        .map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| String::from("unknown"))
}

async fn my_endpoint(req: Request<String>) -> Result<Response<String>, Infallible> {
    println!("API called from: {}", remote_ip_key(&req));
    Ok(Response::new(String::from("ok")))
}

fn request_from(addr: SocketAddr) -> Result<Request<String>, http::Error> {
    let mut req = Request::builder().uri("/api").body(String::new())?;
    req.extensions_mut().insert(addr);
    Ok(req)
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    tracing_subscriber::fmt::init();

    let url = std::env::var("LEAKY_TEST_REDIS_URL")
        .unwrap_or_else(|_| String::from("redis://127.0.0.1/"));
    let store = RedisStore::connect(&url).await?;
    println!("connected to redis");

    let manager = ThrottleManager::new(store);
    let api = manager.throttling_handler(service_fn(my_endpoint), 10, 60, remote_ip_key, "/api")?;

    let busy: SocketAddr = "203.0.113.7:51000".parse()?;
    let quiet: SocketAddr = "198.51.100.20:40000".parse()?;

    for n in 1..=12 {
        let res = api.clone().oneshot(request_from(busy)?).await?;
        let note = if res.status() == StatusCode::TOO_MANY_REQUESTS { "  <- throttled" } else { "" };
        println!("{busy} request {n:>2}: {} {}{note}", res.status(), res.body());
    }

    let res = api.oneshot(request_from(quiet)?).await?;
    println!("{quiet} request  1: {} {}", res.status(), res.body());
    Ok(())
}
