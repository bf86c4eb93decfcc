use anyhow::Result;

fn main() -> Result<()> {
    wineport::cli::run()
}
