use serde::Deserialize;

#[derive(Debug, Deserialize)]
pub struct StoredQuery {
    pub sort: Option<String>,
}

#[derive(Debug, Deserialize)]
pub struct BananaTopUp {
    pub amount: i32,
}
