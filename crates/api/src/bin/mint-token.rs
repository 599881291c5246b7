//! Room token utility for Huntroom
//!
//! Signs a room access token with `JWT_SECRET` for local testing.
//!
//! Usage:
//!   cargo run --bin mint-token -- <user-id> [display-name] [grant ...]
//!
//! Grants default to `*` (every room). Example:
//!   cargo run --bin mint-token -- u1 "Ada" workspace-1 puzzle-7

use huntroom_api::auth::JwtManager;
use huntroom_api::state::ROOM_TOKEN_EXPIRY_HOURS;
use huntroom_shared::Identity;
use std::env;

fn main() -> Result<(), Box<dyn std::error::Error>> {
    dotenvy::dotenv().ok();

    let mut args = env::args().skip(1);
    let Some(user_id) = args.next().filter(|id| !id.is_empty()) else {
        eprintln!("Usage: mint-token <user-id> [display-name] [grant ...]");
        std::process::exit(1);
    };

    let secret = env::var("JWT_SECRET").map_err(|_| "JWT_SECRET must be set")?;
    if secret.len() < 32 {
        return Err("JWT_SECRET must be at least 32 characters".into());
    }

    let mut identity = Identity::new(user_id);
    if let Some(name) = args.next() {
        identity = identity.with_name(name);
    }

    let mut grants: Vec<String> = args.collect();
    if grants.is_empty() {
        grants.push("*".to_string());
    }

    let jwt = JwtManager::new(&secret, ROOM_TOKEN_EXPIRY_HOURS);
    let token = jwt.generate_room_token(&identity, &grants)?;

    println!("{token}");
    Ok(())
}
