use tokio::net::TcpListener;

#[tokio::main]
async fn main() -> Result<(), std::io::Error> {
    let port = std::env::var("PORT").unwrap_or_else(|_| "3000".to_string());
    let addr = format!("127.0.0.1:{port}");
    let app = match std::env::var("TOKEN") {
        Ok(token) => mock_server::app_with_token(token),
        Err(_) => mock_server::app(),
    };
    let listener = TcpListener::bind(&addr).await?;
    println!("listening on {addr}, upload to http://{addr}/post or http://{addr}/api/dumps/");
    mock_server::serve(listener, app).await
}
