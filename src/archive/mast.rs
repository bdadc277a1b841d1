use std::{io::Read, time::Duration};

use flate2::read::GzDecoder;
use reqwest::{blocking::Client, StatusCode};
use serde::Deserialize;

use super::{Archive, ArchiveError, PixelData};
use crate::{Config, EpicId};

type Result<T> = std::result::Result<T, ArchiveError>;

/// One row of the K2 data search results
#[derive(Deserialize, Debug, Clone, PartialEq)]
pub struct SearchRow {
    #[serde(
        rename = "K2 ID",
        alias = "ktc_k2_id",
        default,
        deserialize_with = "text"
    )]
    pub k2_id: String,
    #[serde(
        rename = "Dataset Name",
        alias = "sci_data_set_name",
        default,
        deserialize_with = "text"
    )]
    pub dataset: String,
    #[serde(
        rename = "Campaign",
        alias = "sci_campaign",
        default,
        deserialize_with = "text"
    )]
    pub campaign: String,
    #[serde(
        rename = "Target Type",
        alias = "ktc_target_type",
        default,
        deserialize_with = "text"
    )]
    pub target_type: String,
}
impl SearchRow {
    /// Campaign number, split campaigns (e.g. `102`) included
    fn campaign_number(&self) -> Option<u32> {
        let digits: String = self
            .campaign
            .trim()
            .trim_start_matches(['C', 'c'])
            .chars()
            .take_while(|c| c.is_ascii_digit())
            .collect();
        digits.parse().ok()
    }
    fn is_long_cadence(&self) -> bool {
        self.target_type.is_empty() || self.target_type.eq_ignore_ascii_case("LC")
    }
}

/// Archive columns come either as JSON strings or numbers
fn text<'de, D>(deserializer: D) -> std::result::Result<String, D::Error>
where
    D: serde::Deserializer<'de>,
{
    Ok(match serde_json::Value::deserialize(deserializer)? {
        serde_json::Value::String(s) => s.trim().to_string(),
        serde_json::Value::Null => String::new(),
        value => value.to_string(),
    })
}

/// Parses the JSON output of the K2 data search
pub fn parse_search(json: &str) -> Result<Vec<SearchRow>> {
    let json = json.trim();
    if json.is_empty() {
        return Ok(vec![]);
    }
    Ok(serde_json::from_str(json)?)
}

/// Picks the long cadence row with the lowest campaign number
pub fn select_default(rows: &[SearchRow]) -> Option<&SearchRow> {
    rows.iter()
        .filter(|row| row.is_long_cadence())
        .filter(|row| row.campaign_number().is_some())
        .min_by_key(|row| row.campaign_number())
}

/// Client of the Mikulski Archive for Space Telescopes
pub struct MastArchive {
    base_url: String,
    client: Client,
}
impl MastArchive {
    pub fn new(base_url: impl Into<String>, timeout: Option<Duration>) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(ArchiveError::Client)?;
        Ok(Self {
            base_url: base_url.into().trim_end_matches('/').to_string(),
            client,
        })
    }
    pub fn from_config(config: &Config) -> Result<Self> {
        Self::new(config.mast_url.clone(), config.http_timeout)
    }
    pub fn search_url(&self, epic: EpicId) -> String {
        format!(
            "{}/k2/data_search/search.php?action=Search&outputformat=JSON&ktc_k2_id={}&ktc_target_type=LC&max_records=100",
            self.base_url, epic
        )
    }
    /// URL of the gzipped long cadence target pixel file
    pub fn tpf_url(&self, epic: EpicId, row: &SearchRow) -> Result<String> {
        let campaign = row
            .campaign_number()
            .ok_or_else(|| ArchiveError::Campaign(format!("{row:?}")))?;
        let dataset = if row.dataset.is_empty() {
            format!("ktwo{}-c{:02}", epic, campaign)
        } else {
            row.dataset.to_lowercase()
        };
        let (upper, lower) = epic.archive_dirs();
        Ok(format!(
            "{}/missions/k2/target_pixel_files/c{}/{}/{}/{}_lpd-targ.fits.gz",
            self.base_url, campaign, upper, lower, dataset
        ))
    }
    fn get(&self, url: &str) -> Result<Option<Vec<u8>>> {
        log::debug!("GET {url}");
        let response = self
            .client
            .get(url)
            .send()
            .map_err(|e| ArchiveError::Request(url.to_string(), e))?;
        match response.status() {
            StatusCode::NOT_FOUND => Ok(None),
            status if status.is_success() => {
                let bytes = response
                    .bytes()
                    .map_err(|e| ArchiveError::Request(url.to_string(), e))?;
                Ok(Some(bytes.to_vec()))
            }
            status => Err(ArchiveError::Status {
                url: url.to_string(),
                status,
            }),
        }
    }
}
/// Inflates gzip payloads, passes anything else through
pub fn decompress(name: &str, bytes: Vec<u8>) -> Result<Vec<u8>> {
    if bytes.starts_with(&[0x1f, 0x8b]) {
        let mut buffer = Vec::with_capacity(bytes.len() * 4);
        GzDecoder::new(bytes.as_slice())
            .read_to_end(&mut buffer)
            .map_err(|e| ArchiveError::Decompress(name.to_string(), e))?;
        Ok(buffer)
    } else {
        Ok(bytes)
    }
}
impl Archive for MastArchive {
    fn fetch(&self, epic: EpicId) -> Result<Option<PixelData>> {
        let Some(body) = self.get(&self.search_url(epic))? else {
            return Ok(None);
        };
        let rows = parse_search(&String::from_utf8_lossy(&body))?;
        log::info!("{} archive entries for EPIC {}", rows.len(), epic);
        let Some(row) = select_default(&rows) else {
            return Ok(None);
        };
        let url = self.tpf_url(epic, row)?;
        log::info!("Downloading {url}...");
        let Some(bytes) = self.get(&url)? else {
            log::warn!("{url} not found");
            return Ok(None);
        };
        let dataset = url
            .rsplit('/')
            .next()
            .and_then(|name| name.strip_suffix("_lpd-targ.fits.gz"))
            .unwrap_or(row.dataset.as_str())
            .to_string();
        let bytes = decompress(&dataset, bytes)?;
        log::info!("... {} bytes", bytes.len());
        Ok(Some(PixelData::new(epic, dataset, bytes)))
    }
}

#[cfg(test)]
mod tests {
    use std::{
        io::Write,
        net::TcpListener,
        sync::{Arc, Mutex},
        thread,
    };

    use flate2::{write::GzEncoder, Compression};

    use super::*;

    /// Local HTTP server answering each request path with `route`
    ///
    /// Returns the server URL and the log of the requested paths
    fn serve<F>(route: F) -> (String, Arc<Mutex<Vec<String>>>)
    where
        F: Fn(&str) -> (u16, Vec<u8>) + Send + 'static,
    {
        let listener = TcpListener::bind("127.0.0.1:0").unwrap();
        let url = format!("http://{}", listener.local_addr().unwrap());
        let requests = Arc::new(Mutex::new(vec![]));
        let log = requests.clone();
        thread::spawn(move || {
            for stream in listener.incoming() {
                let mut stream = stream.unwrap();
                let mut head = vec![];
                let mut buffer = [0u8; 1024];
                while !head.windows(4).any(|w| w == b"\r\n\r\n") {
                    let n = stream.read(&mut buffer).unwrap();
                    if n == 0 {
                        break;
                    }
                    head.extend_from_slice(&buffer[..n]);
                }
                let head = String::from_utf8_lossy(&head).to_string();
                let path = head.split_whitespace().nth(1).unwrap_or("").to_string();
                let (status, body) = route(&path);
                log.lock().unwrap().push(path);
                write!(
                    stream,
                    "HTTP/1.1 {status} X\r\nContent-Length: {}\r\nConnection: close\r\n\r\n",
                    body.len()
                )
                .unwrap();
                stream.write_all(&body).unwrap();
            }
        });
        (url, requests)
    }

    fn gzip(bytes: &[u8]) -> Vec<u8> {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(bytes).unwrap();
        encoder.finish().unwrap()
    }

    const ROW: &str = r#"[{"K2 ID": "211414081", "Dataset Name": "KTWO211414081-C05", "Campaign": "5", "Target Type": "LC"}]"#;
    const TPF_PATH: &str =
        "/missions/k2/target_pixel_files/c5/211400000/14000/ktwo211414081-c05_lpd-targ.fits.gz";
    const EPIC: EpicId = EpicId::new(211414081);

    #[test]
    fn fetch_empty_search() {
        let (url, requests) = serve(|_| (200, b"[]".to_vec()));
        let mast = MastArchive::new(url, None).unwrap();
        assert!(mast.fetch(EPIC).unwrap().is_none());
        let requests = requests.lock().unwrap();
        assert_eq!(requests.len(), 1);
        assert!(requests[0].starts_with("/k2/data_search/search.php?"));
        assert!(requests[0].contains("ktc_k2_id=211414081"));
    }

    #[test]
    fn fetch_missing_file() {
        let (url, requests) = serve(|path| {
            if path.starts_with("/k2/data_search") {
                (200, ROW.as_bytes().to_vec())
            } else {
                (404, vec![])
            }
        });
        let mast = MastArchive::new(url, None).unwrap();
        assert!(mast.fetch(EPIC).unwrap().is_none());
        assert_eq!(requests.lock().unwrap()[1], TPF_PATH);
    }

    #[test]
    fn fetch_gzipped_file() {
        let (url, requests) = serve(|path| {
            if path.starts_with("/k2/data_search") {
                (200, ROW.as_bytes().to_vec())
            } else if path == TPF_PATH {
                (200, gzip(b"SIMPLE"))
            } else {
                (404, vec![])
            }
        });
        let mast = MastArchive::new(url, None).unwrap();
        let data = mast.fetch(EPIC).unwrap().unwrap();
        assert_eq!(data.epic, EPIC);
        assert_eq!(data.dataset, "ktwo211414081-c05");
        assert_eq!(data.bytes, b"SIMPLE");
        assert_eq!(requests.lock().unwrap().len(), 2);
    }

    #[test]
    fn fetch_server_error() {
        let (url, _) = serve(|_| (500, b"oops".to_vec()));
        let mast = MastArchive::new(url, None).unwrap();
        assert!(matches!(
            mast.fetch(EPIC),
            Err(ArchiveError::Status { status, .. }) if status == StatusCode::INTERNAL_SERVER_ERROR
        ));
    }

    const SEARCH: &str = r#"[
        {"K2 ID": "211414081", "Dataset Name": "KTWO211414081-C16", "Campaign": "16", "Target Type": "LC"},
        {"K2 ID": 211414081, "Dataset Name": "KTWO211414081-C05", "Campaign": 5, "Target Type": "LC"},
        {"K2 ID": "211414081", "Dataset Name": "KTWO211414081-C05", "Campaign": "5", "Target Type": "SC"}
    ]"#;

    #[test]
    fn search_rows() {
        let rows = parse_search(SEARCH).unwrap();
        assert_eq!(rows.len(), 3);
        assert_eq!(rows[1].k2_id, "211414081");
        assert_eq!(rows[1].campaign, "5");
        let row = select_default(&rows).unwrap();
        assert_eq!(row.dataset, "KTWO211414081-C05");
        assert_eq!(row.target_type, "LC");
    }

    #[test]
    fn empty_search() {
        assert!(parse_search("").unwrap().is_empty());
        assert!(select_default(&parse_search("[]").unwrap()).is_none());
    }

    #[test]
    fn tpf_url() {
        let mast = MastArchive::new("https://archive.stsci.edu/", None).unwrap();
        let rows = parse_search(SEARCH).unwrap();
        let epic = EpicId::new(211414081);
        assert_eq!(
            mast.tpf_url(epic, select_default(&rows).unwrap()).unwrap(),
            "https://archive.stsci.edu/missions/k2/target_pixel_files/c5/211400000/14000/ktwo211414081-c05_lpd-targ.fits.gz"
        );
        let row = SearchRow {
            k2_id: "211414081".into(),
            dataset: String::new(),
            campaign: "5".into(),
            target_type: "LC".into(),
        };
        assert!(mast.tpf_url(epic, &row).unwrap().ends_with("ktwo211414081-c05_lpd-targ.fits.gz"));
    }

    #[test]
    fn gunzip() {
        let mut encoder = GzEncoder::new(Vec::new(), Compression::default());
        encoder.write_all(b"SIMPLE  =                    T").unwrap();
        let gz = encoder.finish().unwrap();
        assert_eq!(
            decompress("test", gz).unwrap(),
            b"SIMPLE  =                    T".to_vec()
        );
        assert_eq!(decompress("raw", b"SIMPLE".to_vec()).unwrap(), b"SIMPLE");
    }
}
