use std::borrow::Cow;
use std::time::Duration;

use futures_core::future::BoxFuture;
use lazy_static::lazy_static;
use regex::Regex;
use reqwest::StatusCode;
use serde::Deserialize;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LookupError {
    #[error("invalid product id")]
    InvalidProductId,
    #[error("failed to retrieve product card: {0}")]
    Http(#[from] reqwest::Error),
    #[error("product api answered with status {0}")]
    Status(StatusCode),
    #[error("invalid product card: {0}")]
    Malformed(Cow<'static, str>),
    #[error("product not found")]
    NotFound,
    #[error("lookup timed out")]
    Timeout,
}

/// Immutable result of one product lookup.
#[derive(Debug, Clone, PartialEq)]
pub struct ProductSnapshot {
    pub product_id: String,
    pub name: String,
    /// Price in kopecks.
    pub price_minor_units: i64,
    pub rating: f64,
    pub stock_quantity: i64,
}

pub trait ProductLookupClient: Send + Sync + 'static {
    fn fetch<'a>(
        &'a self,
        product_id: &'a str,
    ) -> BoxFuture<'a, Result<ProductSnapshot, LookupError>>;
}

lazy_static! {
    static ref PRODUCT_ID_REGEX: Regex = Regex::new("^[0-9]{1,15}$").unwrap();
}

pub fn is_valid_product_id(product_id: &str) -> bool {
    PRODUCT_ID_REGEX.is_match(product_id)
}

/// Single entry point for lookups, shared by the reply path and the
/// notification workers.
pub async fn lookup_product(
    client: &dyn ProductLookupClient,
    product_id: &str,
) -> Result<ProductSnapshot, LookupError> {
    if !is_valid_product_id(product_id) {
        return Err(LookupError::InvalidProductId);
    }

    let snapshot = client.fetch(product_id).await?;
    log::debug!("Got product card for {product_id}: {snapshot:?}");
    Ok(snapshot)
}

#[derive(Deserialize)]
struct CardResponse {
    data: CardData,
}

#[derive(Deserialize)]
struct CardData {
    #[serde(default)]
    products: Vec<Card>,
}

#[derive(Deserialize)]
struct Card {
    name: String,
    #[serde(rename = "salePriceU")]
    sale_price: i64,
    #[serde(rename = "reviewRating", default)]
    review_rating: f64,
    #[serde(default)]
    sizes: Vec<Size>,
}

#[derive(Deserialize)]
struct Size {
    #[serde(default)]
    stocks: Vec<Stock>,
}

#[derive(Deserialize)]
struct Stock {
    qty: i64,
}

fn parse_card(product_id: &str, body: &str) -> Result<ProductSnapshot, LookupError> {
    let response: CardResponse = serde_json::from_str(body)
        .map_err(|e| LookupError::Malformed(e.to_string().into()))?;

    let card = response
        .data
        .products
        .into_iter()
        .next()
        .ok_or(LookupError::NotFound)?;

    let stock_quantity = card
        .sizes
        .iter()
        .flat_map(|size| size.stocks.iter())
        .map(|stock| stock.qty)
        .sum();

    Ok(ProductSnapshot {
        product_id: product_id.to_owned(),
        name: card.name,
        price_minor_units: card.sale_price,
        rating: card.review_rating,
        stock_quantity,
    })
}

/// Client for the Wildberries public card API.
pub struct WbClient {
    client: reqwest::Client,
    base_url: String,
}

impl WbClient {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, LookupError> {
        let client = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            client,
            base_url: base_url.to_owned(),
        })
    }

    fn get_url(&self, product_id: &str) -> String {
        format!("{}&nm={product_id}", self.base_url)
    }

    async fn get_card(&self, product_id: &str) -> Result<ProductSnapshot, LookupError> {
        let url = self.get_url(product_id);
        log::info!("Fetch url {url}");
        let result = self.client.get(url).send().await?;

        let status = result.status();
        if !status.is_success() {
            let text = result.text().await.unwrap_or_default();
            log::warn!("Product api answered {status} for {product_id}: {text}");
            return Err(LookupError::Status(status));
        }

        let body = result.text().await?;
        parse_card(product_id, &body)
    }
}

impl ProductLookupClient for WbClient {
    fn fetch<'a>(
        &'a self,
        product_id: &'a str,
    ) -> BoxFuture<'a, Result<ProductSnapshot, LookupError>> {
        Box::pin(self.get_card(product_id))
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use std::collections::VecDeque;
    use std::sync::Mutex;

    use super::*;

    /// Answers lookups from a script; once the script runs dry it keeps
    /// returning the fallback snapshot.
    pub struct FakeLookup {
        script: Mutex<VecDeque<Result<ProductSnapshot, LookupError>>>,
        fallback: Option<ProductSnapshot>,
        calls: Mutex<Vec<String>>,
    }

    impl FakeLookup {
        pub fn always(snapshot: ProductSnapshot) -> Self {
            Self {
                script: Default::default(),
                fallback: Some(snapshot),
                calls: Default::default(),
            }
        }

        pub fn scripted(script: Vec<Result<ProductSnapshot, LookupError>>) -> Self {
            Self {
                script: Mutex::new(script.into()),
                fallback: None,
                calls: Default::default(),
            }
        }

        pub fn calls(&self) -> Vec<String> {
            self.calls.lock().unwrap().clone()
        }
    }

    impl ProductLookupClient for FakeLookup {
        fn fetch<'a>(
            &'a self,
            product_id: &'a str,
        ) -> BoxFuture<'a, Result<ProductSnapshot, LookupError>> {
            self.calls.lock().unwrap().push(product_id.to_owned());
            let next = self.script.lock().unwrap().pop_front();
            let result = match next {
                Some(result) => result,
                None => match &self.fallback {
                    Some(snapshot) => Ok(ProductSnapshot {
                        product_id: product_id.to_owned(),
                        ..snapshot.clone()
                    }),
                    None => Err(LookupError::NotFound),
                },
            };
            Box::pin(async move { result })
        }
    }

    pub fn widget(product_id: &str) -> ProductSnapshot {
        ProductSnapshot {
            product_id: product_id.to_owned(),
            name: "Widget".to_owned(),
            price_minor_units: 1999,
            rating: 4.5,
            stock_quantity: 3,
        }
    }

    const CARD: &str = r#"{
        "state": 0,
        "data": {
            "products": [{
                "id": 123,
                "name": "Widget",
                "salePriceU": 1999,
                "reviewRating": 4.5,
                "sizes": [
                    {"name": "S", "stocks": [{"wh": 1, "qty": 2}, {"wh": 2, "qty": 1}]},
                    {"name": "M", "stocks": []}
                ]
            }]
        }
    }"#;

    #[test]
    fn parses_card_payload() {
        let snapshot = parse_card("123", CARD).unwrap();
        assert_eq!(snapshot, widget("123"));
    }

    #[test]
    fn missing_stocks_count_as_zero() {
        let body = r#"{"data": {"products": [{"name": "Bare", "salePriceU": 100}]}}"#;
        let snapshot = parse_card("1", body).unwrap();
        assert_eq!(snapshot.stock_quantity, 0);
        assert_eq!(snapshot.rating, 0.0);
    }

    #[test]
    fn empty_product_list_is_not_found() {
        let body = r#"{"data": {"products": []}}"#;
        assert!(matches!(parse_card("1", body), Err(LookupError::NotFound)));
    }

    #[test]
    fn garbage_is_malformed() {
        assert!(matches!(
            parse_card("1", "<html>oops</html>"),
            Err(LookupError::Malformed(_))
        ));
        assert!(matches!(
            parse_card("1", r#"{"data": {"products": [{"name": "x"}]}}"#),
            Err(LookupError::Malformed(_))
        ));
    }

    #[test]
    fn product_id_shape() {
        assert!(is_valid_product_id("123456789"));
        assert!(!is_valid_product_id(""));
        assert!(!is_valid_product_id("12a"));
        assert!(!is_valid_product_id("1234567890123456"));
    }

    #[tokio::test]
    async fn invalid_id_never_reaches_client() {
        let client = FakeLookup::always(widget("1"));
        let result = lookup_product(&client, "abc").await;
        assert!(matches!(result, Err(LookupError::InvalidProductId)));
        assert!(client.calls().is_empty());
    }

    #[tokio::test]
    async fn repeated_lookups_are_identical() {
        let client = FakeLookup::always(widget("123"));
        let first = lookup_product(&client, "123").await.unwrap();
        let second = lookup_product(&client, "123").await.unwrap();
        assert_eq!(first, second);
        assert_eq!(client.calls(), vec!["123", "123"]);
    }

    /// Serves every connection with the same canned response and returns the
    /// card url to use with it.
    async fn answering(status: &'static str, body: &'static str) -> String {
        use tokio::io::{AsyncReadExt, AsyncWriteExt};

        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        tokio::spawn(async move {
            while let Ok((mut socket, _)) = listener.accept().await {
                let mut request = [0; 4096];
                let _ = socket.read(&mut request).await;
                let response = format!(
                    "HTTP/1.1 {status}\r\ncontent-type: application/json\r\ncontent-length: {}\r\nconnection: close\r\n\r\n{body}",
                    body.len()
                );
                let _ = socket.write_all(response.as_bytes()).await;
            }
        });
        format!("http://{addr}/cards/v1/detail?appType=1&dest=-1257786")
    }

    fn client(base_url: String) -> WbClient {
        WbClient {
            client: reqwest::Client::builder()
                .no_proxy()
                .timeout(Duration::from_secs(5))
                .build()
                .unwrap(),
            base_url,
        }
    }

    #[tokio::test]
    async fn error_status_is_a_lookup_error() {
        for (status, code) in [("404 Not Found", 404), ("500 Internal Server Error", 500)] {
            let client = client(answering(status, "").await);
            match lookup_product(&client, "123").await {
                Err(LookupError::Status(s)) => assert_eq!(s.as_u16(), code),
                other => panic!("unexpected result for {status}: {other:?}"),
            }
        }
    }

    #[tokio::test]
    async fn fetches_card_over_http() {
        let client = client(answering("200 OK", CARD).await);
        let snapshot = lookup_product(&client, "123").await.unwrap();
        assert_eq!(snapshot, widget("123"));
    }
}
