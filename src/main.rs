#[tokio::main]
async fn main() {
    rentdesk::boot::boot().await;
}
