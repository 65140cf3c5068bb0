//! Product search through the site's Coveo search backend.
//!
//! Unlike the store lookup this path skips the browser entirely: the site's
//! own frontend queries a Coveo REST endpoint, and the same endpoint answers
//! a plain HTTP client carrying a current bearer token. The token and the
//! optional session cookie are injected from outside (token file, env) and
//! are never baked into the binary. Field names in the Coveo index are
//! machine-mangled (`z95x`/`z32x` escapes), hence the rename gymnastics.

use serde::{Deserialize, Serialize};
use tracing::info;

use crate::error::ProductError;

const SEARCH_URL: &str = "https://www.abc.virginia.gov/coveo/rest/search/v2?sitecoreItemUri=sitecore%3A%2F%2Fweb%2F%7B514C7796-41D8-497D-AA53-FE33B3716B88%7D%3Flang%3Den%26amp%3Bver%3D2&siteName=website";
const ORIGIN: &str = "https://www.abc.virginia.gov";
const DEFAULT_TOKEN_FILE: &str = "uptodatetoken.txt";

/// One product row as returned to API consumers. Wire names follow the
/// original public API of this service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, utoipa::ToSchema)]
pub struct ProductRecord {
    pub title: String,
    #[serde(rename = "productid")]
    pub product_id: String,
    pub sizes: String,
    #[serde(rename = "sizesID")]
    pub sizes_id: String,
    #[serde(rename = "sizesprice")]
    pub sizes_price: String,
    pub abv: f64,
    pub image: String,
}

#[derive(Debug, Deserialize)]
struct SearchResponse {
    #[serde(default)]
    results: Vec<SearchRow>,
}

#[derive(Debug, Deserialize)]
struct SearchRow {
    #[serde(default)]
    raw: RawProduct,
}

#[derive(Debug, Default, Deserialize)]
#[serde(default)]
struct RawProduct {
    #[serde(rename = "systitle")]
    sys_title: String,
    #[serde(rename = "z95xproductz32xids")]
    product_id: String,
    #[serde(rename = "z95xproductz32xskuz32xids")]
    sku_ids: Vec<String>,
    #[serde(rename = "z95xproductz32xsiz122xes")]
    sizes: String,
    #[serde(rename = "z95xproductz32xprice")]
    prices: Vec<String>,
    #[serde(rename = "abvmaz120x")]
    abv: f64,
    #[serde(rename = "z95ximagez32xurl")]
    image: String,
}

/// Read the bearer token: first line of the token file, refreshed out of
/// band by a separate process.
fn read_token(path: &str) -> Result<String, ProductError> {
    let contents = std::fs::read_to_string(path).map_err(|source| ProductError::TokenRead {
        path: path.to_string(),
        source,
    })?;
    let token = contents.lines().next().unwrap_or("").trim().to_string();
    if token.is_empty() {
        return Err(ProductError::TokenEmpty {
            path: path.to_string(),
        });
    }
    Ok(token)
}

fn token_file_path() -> String {
    std::env::var("TOKEN_FILE").unwrap_or_else(|_| DEFAULT_TOKEN_FILE.to_string())
}

/// Form-encoded body mirroring the query the site's own search page sends.
fn build_search_body(query: &str) -> String {
    let aq = "(NOT (@z95xproductz32xlabelz32xduplicate == 'True')) (@z95xresultz32xtype)";
    let cq = "(@z95xlanguage==en) (@z95xlatestversion==1) (@source==\"Coveo_web_index - KubProd2\")";
    let params: Vec<(&str, &str)> = vec![
        ("q", query),
        ("aq", aq),
        ("cq", cq),
        ("searchHub", "Search-Results"),
        ("locale", "en"),
        ("maximumAge", "900000"),
        ("firstResult", "0"),
        ("numberOfResults", "12"),
        ("excerptLength", "200"),
        ("enableDidYouMean", "true"),
        ("sortCriteria", "relevancy"),
        ("retrieveFirstSentences", "true"),
        ("timezone", "America/New_York"),
        ("enableQuerySyntax", "false"),
        ("allowQueriesWithoutKeywords", "true"),
    ];
    params
        .into_iter()
        .map(|(key, value)| format!("{}={}", key, urlencoding::encode(value)))
        .collect::<Vec<_>>()
        .join("&")
}

/// Map one raw index row onto the public shape. Rows without a product id
/// are catalog noise and dropped.
fn map_product(raw: RawProduct) -> Option<ProductRecord> {
    if raw.product_id.is_empty() {
        return None;
    }

    // "Product 12345" becomes "12345", but "Product # Varies" is a real
    // catalog value and stays intact.
    let product_id = if raw.product_id.starts_with("Product ") && !raw.product_id.contains("# Varies")
    {
        raw.product_id.trim_start_matches("Product ").to_string()
    } else {
        raw.product_id
    };

    let image = if !raw.image.is_empty() && !raw.image.starts_with("http") {
        format!("{ORIGIN}{}", raw.image)
    } else {
        raw.image
    };

    Some(ProductRecord {
        title: raw.sys_title,
        product_id,
        sizes: raw.sizes,
        sizes_id: raw.sku_ids.join(", "),
        sizes_price: raw.prices.join(", "),
        abv: raw.abv,
        image,
    })
}

fn parse_search_response(body: &str) -> Result<Vec<ProductRecord>, ProductError> {
    let response: SearchResponse = serde_json::from_str(body)?;
    Ok(response
        .results
        .into_iter()
        .filter_map(|row| map_product(row.raw))
        .collect())
}

/// Query the product index for `query` and return the mapped rows.
pub async fn search_products(query: &str) -> Result<Vec<ProductRecord>, ProductError> {
    let token = read_token(&token_file_path())?;

    let client = reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(30))
        .build()?;

    let mut request = client
        .post(SEARCH_URL)
        .header("Authorization", format!("Bearer {token}"))
        .header("User-Agent", crate::stealth::pick_user_agent())
        .header("Content-Type", "application/x-www-form-urlencoded; charset=UTF-8")
        .header("Accept", "*/*")
        .header("Origin", ORIGIN)
        .header("Referer", format!("{ORIGIN}/search-results"))
        .body(build_search_body(query));

    // A current cf_clearance cookie helps on hosts Cloudflare rates poorly;
    // it is optional and supplied by the operator.
    if let Ok(cookie) = std::env::var("COVEO_COOKIE") {
        if !cookie.is_empty() {
            request = request.header("Cookie", cookie);
        }
    }

    let response = request.send().await?;
    let status = response.status();
    let body = response.text().await?;
    if status.as_u16() != 200 {
        return Err(ProductError::UnexpectedStatus {
            status: status.as_u16(),
            body,
        });
    }

    let products = parse_search_response(&body)?;
    info!(query, count = products.len(), "product search finished");
    Ok(products)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn raw(product_id: &str) -> RawProduct {
        RawProduct {
            sys_title: "Example Bourbon".to_string(),
            product_id: product_id.to_string(),
            sku_ids: vec!["101".to_string(), "102".to_string()],
            sizes: "750 ml".to_string(),
            prices: vec!["24.99".to_string(), "44.99".to_string()],
            abv: 45.0,
            image: "/media/example.png".to_string(),
        }
    }

    #[test]
    fn product_prefix_is_stripped_from_ids() {
        let product = map_product(raw("Product 12345")).unwrap();
        assert_eq!(product.product_id, "12345");
    }

    #[test]
    fn varying_product_ids_keep_their_prefix() {
        let product = map_product(raw("Product # Varies")).unwrap();
        assert_eq!(product.product_id, "Product # Varies");
    }

    #[test]
    fn rows_without_product_id_are_dropped() {
        assert!(map_product(raw("")).is_none());
    }

    #[test]
    fn relative_image_paths_get_the_site_origin() {
        let product = map_product(raw("Product 1")).unwrap();
        assert_eq!(product.image, "https://www.abc.virginia.gov/media/example.png");

        let mut absolute = raw("Product 1");
        absolute.image = "https://cdn.example.com/x.png".to_string();
        assert_eq!(
            map_product(absolute).unwrap().image,
            "https://cdn.example.com/x.png"
        );
    }

    #[test]
    fn array_fields_join_into_comma_separated_strings() {
        let product = map_product(raw("Product 1")).unwrap();
        assert_eq!(product.sizes_id, "101, 102");
        assert_eq!(product.sizes_price, "24.99, 44.99");
    }

    #[test]
    fn search_body_urlencodes_the_query() {
        let body = build_search_body("maker's mark 46");
        assert!(body.contains("q=maker%27s%20mark%2046"));
        assert!(body.contains("searchHub=Search-Results"));
        assert!(!body.contains("q=maker's"));
    }

    #[test]
    fn response_rows_parse_through_the_mangled_index_names() {
        let body = r#"{
            "results": [
                {
                    "title": "display title",
                    "raw": {
                        "systitle": "Example Bourbon",
                        "z95xproductz32xids": "Product 12345",
                        "z95xproductz32xskuz32xids": ["101"],
                        "z95xproductz32xsiz122xes": "750 ml",
                        "z95xproductz32xprice": ["24.99"],
                        "abvmaz120x": 45.0,
                        "z95ximagez32xurl": "/media/example.png"
                    }
                },
                { "title": "no id", "raw": { "systitle": "Skipped" } }
            ]
        }"#;
        let products = parse_search_response(body).unwrap();
        assert_eq!(products.len(), 1);
        assert_eq!(products[0].title, "Example Bourbon");
        assert_eq!(products[0].product_id, "12345");
        assert_eq!(products[0].abv, 45.0);
    }

    #[test]
    fn token_is_first_line_of_the_token_file() {
        let path = std::env::temp_dir().join(format!("token-test-{}.txt", std::process::id()));
        std::fs::write(&path, "abc123\nleftover debug output\n").unwrap();
        let token = read_token(path.to_str().unwrap()).unwrap();
        std::fs::remove_file(&path).unwrap();
        assert_eq!(token, "abc123");
    }

    #[test]
    fn empty_token_file_is_an_error() {
        let path = std::env::temp_dir().join(format!("token-empty-{}.txt", std::process::id()));
        std::fs::write(&path, "\n").unwrap();
        let err = read_token(path.to_str().unwrap()).unwrap_err();
        std::fs::remove_file(&path).unwrap();
        assert!(matches!(err, ProductError::TokenEmpty { .. }));
    }
}
