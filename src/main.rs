#[tokio::main]
async fn main() {
    // Exit explicitly: a pending stdin read would otherwise hold the runtime open.
    let code = match gasoline_daemon::cli::run().await {
        Ok(()) => 0,
        Err(err) => {
            eprintln!("Error: {err:#}");
            1
        }
    };
    std::process::exit(code);
}
