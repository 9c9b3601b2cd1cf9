fn main() -> anyhow::Result<()> {
    brrtrest::cli::run_cli()
}
