//! `remove-bg`: remove the background from a wardrobe photo
//!
//! Run without arguments to process the default input into
//! `temp_processed_imgs/test.png`.

#[cfg(feature = "cli")]
use closet_bgremove::cli;

#[cfg(feature = "cli")]
#[tokio::main]
async fn main() -> anyhow::Result<()> {
    cli::main().await
}

#[cfg(not(feature = "cli"))]
fn main() {
    eprintln!("remove-bg was built without the `cli` feature");
    std::process::exit(1);
}
