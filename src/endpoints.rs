/// G-Portal web root. Catalogue and dataset-tree paths are joined onto this.
pub const BASE_URL: &str = "https://gportal.jaxa.jp/";

/// CSW `GetRecords` endpoint, relative to the base URL.
pub const CSW_PATH: &str = "/csw/csw";

/// Undocumented spacecraft/sensor tree used by the web UI.
pub const DATASETS_PATH: &str = "/gpr/search/service/satsensor.json";

/// Prefix of `product.fileName` URLs; the remainder is the SFTP path.
pub const DOWNLOAD_URL_PREFIX: &str = "https://gportal.jaxa.jp/download/";

pub const SFTP_HOST: &str = "ftp.gportal.jaxa.jp";
pub const SFTP_PORT: u16 = 2051;

pub const USERNAME_ENV: &str = "GPORTAL_USERNAME";
pub const PASSWORD_ENV: &str = "GPORTAL_PASSWORD";

