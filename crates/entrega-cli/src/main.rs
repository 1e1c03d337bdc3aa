//! entrega - command-line front-end for the delivery platform.
//!
//! A thin consumer of `entrega-core`: sign in, browse merchants and
//! products, and follow orders from a terminal. All state lives in the
//! hosted backend; the CLI only renders it.

use std::io::{self, Write};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::info;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use entrega_core::api::{PlatformApi, RestClient};
use entrega_core::auth::{AuthClient, Session, TokenStore};
use entrega_core::config::{PlatformConfig, Preferences};
use entrega_core::models::OrderStatus;
use entrega_core::transport::ReqwestTransport;

const USAGE: &str = "\
entrega - delivery platform client

USAGE:
    entrega <command> [args]

COMMANDS:
    login [email]         Sign in and store the session
    logout                Drop the stored session
    whoami                Show the signed-in user and loyalty status
    merchants             List storefronts
    products <merchant>   List a merchant's products
    orders [status]       List orders, optionally filtered by status
    order <id>            Show one order with items and tracking
";

/// Initialize the tracing subscriber for logging
fn init_tracing() {
    // Use RUST_LOG env var to control log level (e.g., RUST_LOG=debug)
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));

    tracing_subscriber::registry()
        .with(fmt::layer().with_writer(io::stderr))
        .with(filter)
        .init();
}

struct App {
    session: Session,
    api: PlatformApi,
}

impl App {
    fn new() -> Result<Self> {
        let config = Arc::new(PlatformConfig::from_env()?);
        let transport = Arc::new(ReqwestTransport::new().context("failed to build HTTP client")?);
        let tokens = Arc::new(TokenStore::with_keychain());
        let auth = Arc::new(AuthClient::new(
            config.clone(),
            tokens.clone(),
            transport.clone(),
        ));
        let rest = RestClient::new(config, tokens.clone(), auth.clone(), transport);
        let api = PlatformApi::new(rest);
        let session = Session::new(auth, tokens, api.clone());
        Ok(Self { session, api })
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present (silently ignore if not found)
    let _ = dotenvy::dotenv();
    init_tracing();

    let args: Vec<String> = std::env::args().collect();
    let command = args.get(1).map(String::as_str).unwrap_or("help");

    if matches!(command, "help" | "--help" | "-h") {
        print!("{USAGE}");
        return Ok(());
    }

    let mut app = App::new()?;

    match command {
        "login" => login(&mut app, args.get(2).map(String::as_str)).await,
        "logout" => logout(&mut app),
        "whoami" => whoami(&mut app).await,
        "merchants" => merchants(&app).await,
        "products" => {
            let merchant_id = args
                .get(2)
                .context("usage: entrega products <merchant-id>")?;
            products(&app, merchant_id).await
        }
        "orders" => {
            let status = args
                .get(2)
                .map(|s| s.parse::<OrderStatus>())
                .transpose()
                .map_err(|e| anyhow::anyhow!(e))?;
            orders(&mut app, status).await
        }
        "order" => {
            let id: i64 = args
                .get(2)
                .context("usage: entrega order <id>")?
                .parse()
                .context("order id must be a number")?;
            order_detail(&mut app, id).await
        }
        other => {
            eprintln!("unknown command: {other}\n");
            print!("{USAGE}");
            std::process::exit(2);
        }
    }
}

async fn login(app: &mut App, email_arg: Option<&str>) -> Result<()> {
    let mut prefs = Preferences::load().unwrap_or_default();

    let email = match email_arg {
        Some(email) => email.to_string(),
        None => {
            let default = prefs.last_email.clone().unwrap_or_default();
            let prompt = if default.is_empty() {
                "Email: ".to_string()
            } else {
                format!("Email [{default}]: ")
            };
            let typed = prompt_line(&prompt)?;
            if typed.is_empty() { default } else { typed }
        }
    };
    if email.is_empty() {
        anyhow::bail!("an email is required to sign in");
    }

    let password = rpassword::prompt_password("Password: ")?;
    if password.is_empty() {
        anyhow::bail!("a password is required to sign in");
    }

    let outcome = app.session.sign_in(&email, &password).await?;
    if !outcome.profile_synced {
        eprintln!("warning: signed in, but the profile could not be synced");
    }

    prefs.last_email = Some(email);
    if let Err(error) = prefs.save() {
        info!(error = %error, "could not save preferences");
    }

    match app.session.user() {
        Some(user) => println!(
            "Signed in as {} ({})",
            user.display_name().unwrap_or("unnamed"),
            user.role()
        ),
        None => println!("Signed in"),
    }
    Ok(())
}

fn logout(app: &mut App) -> Result<()> {
    app.session.sign_out();
    println!("Signed out");
    Ok(())
}

async fn whoami(app: &mut App) -> Result<()> {
    app.session.bootstrap().await;
    let Some(user) = app.session.user() else {
        println!("Not signed in. Run `entrega login` first.");
        return Ok(());
    };

    println!("id:    {}", user.id());
    println!("email: {}", user.email().unwrap_or("-"));
    println!("name:  {}", user.display_name().unwrap_or("-"));
    println!("role:  {}", user.role());

    if let Some(profile) = &user.profile {
        let level = profile.loyalty_level();
        let percent = (level.progress(profile.points) * 100.0).round();
        println!(
            "loyalty: {} - {} points, {}% to {}",
            level.label(),
            profile.points,
            percent,
            level.next_threshold()
        );
    }
    Ok(())
}

async fn merchants(app: &App) -> Result<()> {
    let merchants = app.api.list_merchants().await?;
    if merchants.is_empty() {
        println!("No merchants available.");
        return Ok(());
    }
    for merchant in merchants {
        println!(
            "{}  {}  (delivery ${:.0})",
            merchant.id, merchant.business_name, merchant.delivery_fee
        );
    }
    Ok(())
}

async fn products(app: &App, merchant_id: &str) -> Result<()> {
    let products = app.api.list_products(Some(merchant_id)).await?;
    if products.is_empty() {
        println!("No products for merchant {merchant_id}.");
        return Ok(());
    }
    for product in products {
        let availability = if product.in_stock() { "" } else { "  [out of stock]" };
        println!(
            "{}  {}  ${:.0}{}",
            product.id, product.name, product.price, availability
        );
    }
    Ok(())
}

async fn orders(app: &mut App, status: Option<OrderStatus>) -> Result<()> {
    app.session.bootstrap().await;
    let orders = app.api.list_orders(status).await?;
    if orders.is_empty() {
        println!("No orders.");
        return Ok(());
    }
    for order in orders {
        println!(
            "#{}  {}  ${:.0}  {}",
            order.id,
            order.status.label(),
            order.total,
            order.address.as_deref().unwrap_or("-")
        );
    }
    Ok(())
}

async fn order_detail(app: &mut App, id: i64) -> Result<()> {
    app.session.bootstrap().await;

    let order = app
        .api
        .order_by_id(id)
        .await?
        .with_context(|| format!("order #{id} not found"))?;

    println!("Order #{}", order.id);
    if let Some(code) = &order.code {
        println!("code:    {code}");
    }
    println!("status:  {}", order.status.label());
    println!("total:   ${:.0}", order.total);
    if let Some(address) = &order.address {
        println!("address: {address}");
    }

    let items = app.api.list_order_items(id).await?;
    if !items.is_empty() {
        println!("\nItems:");
        for item in items {
            println!("  {}x {}", item.quantity, item.name);
        }
    }

    // Four-step tracking timeline, cancelled orders excepted
    if order.status == OrderStatus::Cancelled {
        println!("\nThis order was cancelled.");
        if let Some(reason) = &order.cancellation_reason {
            println!("reason: {reason}");
        }
    } else {
        let current = order.status.timeline_step();
        println!("\nTracking:");
        for step in [
            OrderStatus::Pending,
            OrderStatus::Preparing,
            OrderStatus::InTransit,
            OrderStatus::Delivered,
        ] {
            let marker = if current >= step.timeline_step() { "x" } else { " " };
            println!("  [{marker}] {}", step.label());
        }
    }

    if let Some(delivery) = app.api.delivery_by_order(id).await? {
        if let Some(courier) = &order.courier_name {
            println!("\ncourier: {courier}");
        }
        if let Some(at) = delivery.picked_up_at {
            println!("picked up at {at}");
        }
        if let Some(at) = delivery.delivered_at {
            println!("delivered at {at}");
        }
    }

    Ok(())
}

fn prompt_line(prompt: &str) -> Result<String> {
    print!("{prompt}");
    io::stdout().flush()?;
    let mut line = String::new();
    io::stdin().read_line(&mut line)?;
    Ok(line.trim().to_string())
}
