#![forbid(unsafe_code)]

//! Rust client for JAXA G-Portal.
//!
//! Search the G-Portal catalogue (OGC CSW 3.0.0 with GeoJSON output) for
//! satellite products, walk the results lazily page by page, browse the
//! spacecraft/sensor dataset tree, and download product files over SFTP.
//!
//! **Searching**
//! ```no_run
//! use gportal::{Client, SearchCriteria};
//!
//! let client = Client::default_client()?;
//! let criteria = SearchCriteria::new()
//!     .dataset_ids(["10002000"])
//!     .bbox([130.0, 30.0, 140.0, 40.0])
//!     .start_time("2023-03-28T00:00:00")
//!     .end_time("2023-03-28T23:59:59");
//! let search = client.search(&criteria)?;
//!
//! println!("{} matches", search.matched()?);
//! for product in search.products() {
//!     let product = product?;
//!     println!("{:?} {:?}", product.id(), product.data_path());
//! }
//! # Ok::<(), gportal::Error>(())
//! ```
//!
//! **Downloading**
//! ```no_run
//! use gportal::{SftpClient, SftpConfig};
//!
//! let sftp = SftpClient::connect(&SftpConfig::from_env()?)?;
//! let files = sftp.list_dir("/standard/GCOM-C/GCOM-C.SGLI", None, true)?;
//! sftp.download(&files[..1], ".")?;
//! # Ok::<(), gportal::Error>(())
//! ```
//!
//! Notes:
//! - Each call to [`Search::products`] re-runs the whole paginated query.
//! - The dataset tree endpoint is undocumented and may change.
//! - Logging goes through `tracing`; install a subscriber to see page fetches.

mod client;
mod datasets;
mod endpoints;
mod error;
mod product;
mod query;
mod search;
mod sftp;
mod time;

pub use crate::client::{Client, ClientOptions};
pub use crate::datasets::{DatasetNode, DatasetTree};
pub use crate::error::{Error, Result};
pub use crate::product::{Product, convert_types};
pub use crate::query::{BoundingBox, DEFAULT_PAGE_SIZE, MAX_PAGE_SIZE, ParamValue, Parameters, SearchCriteria, TimeInput};
pub use crate::search::{CollectionProperties, FeatureCollection, Pages, Products, Search, SearchTransport};
pub use crate::sftp::{Credentials, RemoteFileSystem, SftpClient, SftpConfig};
pub use crate::time::TimeBound;
