use crate::url::ListingAddress;
use crate::UrlError;
use url::Url;

/// Query parameters that never identify a listing
const TRACKING_PARAMS: &[&str] = &["fbclid", "gclid", "mc_eid"];

/// Canonicalizes a detail link into a [`ListingAddress`]
///
/// # Canonicalization Steps
///
/// 1. Resolve `href` against `base`; reject if malformed
/// 2. Accept only `http` and `https`
/// 3. Lowercase the host
/// 4. Normalize the path:
///    - Remove empty and dot segments
///    - Remove trailing slash (except for root /)
/// 5. Remove the fragment
/// 6. Remove tracking query parameters and sort the rest
///
/// # Examples
///
/// ```
/// use listing_trawl::url::canonicalize;
/// use url::Url;
///
/// let base = Url::parse("https://www.jobs.ch").unwrap();
/// let address = canonicalize("/en/vacancies/detail/42/?utm_source=x#top", &base).unwrap();
/// assert_eq!(address.as_str(), "https://www.jobs.ch/en/vacancies/detail/42");
/// ```
pub fn canonicalize(href: &str, base: &Url) -> Result<ListingAddress, UrlError> {
    let mut url = base
        .join(href.trim())
        .map_err(|e| UrlError::Parse(format!("{}: {}", href, e)))?;

    if url.scheme() != "http" && url.scheme() != "https" {
        return Err(UrlError::InvalidScheme(url.scheme().to_string()));
    }

    let host = url.host_str().ok_or(UrlError::MissingHost)?.to_lowercase();
    url.set_host(Some(&host))
        .map_err(|e| UrlError::Parse(format!("Failed to set host: {}", e)))?;

    let normalized_path = normalize_path(url.path());
    url.set_path(&normalized_path);

    url.set_fragment(None);

    if url.query().is_some() {
        let params = filter_and_sort_query_params(&url);
        if params.is_empty() {
            url.set_query(None);
        } else {
            url.query_pairs_mut().clear().extend_pairs(params);
        }
    }

    Ok(ListingAddress::from_canonical(url.to_string()))
}

/// Normalizes a URL path by removing dot segments and trailing slashes
fn normalize_path(path: &str) -> String {
    let mut segments: Vec<&str> = Vec::new();

    for segment in path.split('/') {
        match segment {
            "" | "." => continue,
            ".." => {
                segments.pop();
            }
            _ => segments.push(segment),
        }
    }

    format!("/{}", segments.join("/"))
}

/// Filters out tracking parameters and sorts remaining query parameters
fn filter_and_sort_query_params(url: &Url) -> Vec<(String, String)> {
    let mut params: Vec<(String, String)> = url
        .query_pairs()
        .filter(|(key, _)| !is_tracking_param(key))
        .map(|(k, v)| (k.to_string(), v.to_string()))
        .collect();

    params.sort();
    params
}

fn is_tracking_param(key: &str) -> bool {
    TRACKING_PARAMS.contains(&key) || key.starts_with("utm_")
}
