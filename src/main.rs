#[tokio::main]
async fn main() {
    let code = match deskbridge_lib::run().await {
        Ok(()) => 0,
        Err(e) => {
            tracing::error!(error = %e, "deskbridge exited with an error");
            1
        }
    };
    // A stdin read may still be parked on a blocking thread after Ctrl-C, and
    // the runtime would wait for it on drop until the client closes the pipe.
    std::process::exit(code);
}
