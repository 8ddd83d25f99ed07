mod app;
mod classifier;
mod config;
mod devd;
mod drivers;
mod identity;
mod input;
mod monitor;
mod registry;
mod signals;

#[cfg(test)]
mod testing;

#[tokio::main(flavor = "current_thread")]
async fn main() -> anyhow::Result<()> {
  app::run().await
}
