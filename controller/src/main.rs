mod api;
mod commands;
mod dispatch;
mod group;
mod registry;
mod service;
mod store;
mod transport;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    service::run().await
}
