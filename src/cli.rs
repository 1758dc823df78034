use std::io::Write;
use std::sync::Arc;
use tokio::io::{AsyncBufRead, AsyncBufReadExt, BufReader};
use tracing::info;

use crate::env::Env;
use crate::error::ValidationError;
use crate::order::{Order, Outcome};
use crate::submission::OrderRequest;
use crate::tracker::OrderTracker;
use order_backend::{HttpBackend, OrderBackend};

/// Reads `<product> <quantity>` lines from stdin until EOF or Ctrl-C, printing
/// every order change as it is reconciled.
pub async fn run(env: Env) -> anyhow::Result<()> {
    let backend = Arc::new(HttpBackend::new(env.backend_config())?);
    let tracker = OrderTracker::start(backend, env.tracker_config());
    tracker.on_order_changed(|order: &Order| println!("{}", describe(order)));

    info!("Submitting orders to {}", env.base_url);

    let stdin = BufReader::new(tokio::io::stdin());
    let mut stdout = std::io::stdout();

    tokio::select! {
        result = run_with_io(&tracker, stdin, &mut stdout) => result?,
        _ = tokio::signal::ctrl_c() => info!("Received Ctrl-C, stopping"),
    }

    tracker.shutdown();
    write_summary(&tracker.orders().await, &mut stdout)?;

    Ok(())
}

async fn run_with_io<B, R, W>(
    tracker: &OrderTracker<B>,
    input: R,
    stdout: &mut W,
) -> anyhow::Result<()>
where
    B: OrderBackend + ?Sized,
    R: AsyncBufRead + Unpin,
    W: Write,
{
    let mut lines = input.lines();

    while let Some(line) = lines.next_line().await? {
        let Some(request) = parse_line(&line) else {
            continue;
        };

        match request {
            Ok(request) => match tracker.submit_request(&request).await {
                Ok(order_id) => writeln!(stdout, "Submitted order {order_id}")?,
                Err(e) => writeln!(stdout, "Submission failed: {e}")?,
            },
            Err(e) => writeln!(stdout, "Invalid order: {e}")?,
        }
    }

    Ok(())
}

/// The last whitespace-separated token is the quantity, the rest the product.
/// Blank lines yield `None`.
fn parse_line(line: &str) -> Option<Result<OrderRequest, ValidationError>> {
    let line = line.trim();
    if line.is_empty() {
        return None;
    }

    let (product, quantity) = line
        .rsplit_once(char::is_whitespace)
        .unwrap_or((line, ""));

    Some(OrderRequest::parse(product, quantity))
}

fn describe(order: &Order) -> String {
    let tag = match order.outcome {
        Outcome::InProgress => "..",
        Outcome::Succeeded => "OK",
        Outcome::Failed => "!!",
    };

    let item = match (&order.product, order.quantity) {
        (Some(product), Some(quantity)) => format!("{quantity} x {product}"),
        _ => "(untracked)".to_string(),
    };

    match &order.detail {
        Some(detail) => format!("[{tag}] {} {item}: {} ({detail})", order.id, order.status),
        None => format!("[{tag}] {} {item}: {}", order.id, order.status),
    }
}

fn write_summary<W: Write>(orders: &[Order], stdout: &mut W) -> std::io::Result<()> {
    if orders.is_empty() {
        return Ok(());
    }

    writeln!(stdout, "{} orders:", orders.len())?;
    for order in orders {
        writeln!(stdout, "  {}", describe(order))?;
    }

    Ok(())
}
