use ticket_reflect_api::run;

#[tokio::main]
async fn main() {
    if let Err(err) = run().await {
        eprintln!("ticket-reflect error: {err}");
        std::process::exit(1);
    }
}
