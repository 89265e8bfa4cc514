#[actix_web::main]
async fn main() -> std::io::Result<()> {
    paver_estimate_server::run().await
}
