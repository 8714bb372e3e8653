use std::env;

use gportal::{Client, SearchCriteria, SftpClient, SftpConfig};

const USAGE: &str = "Usage:
  cargo run --example cli -- search <datasetId> [start] [end] [west,south,east,north]
  cargo run --example cli -- datasets
  cargo run --example cli -- download <datasetId> <dir> [limit] [start] [end]

Example (GCOM-C/SGLI L2 SST, one day):
  cargo run --example cli -- search 10002000 2023-03-28 2023-03-28T23:59:59

Notes:
- download needs GPORTAL_USERNAME and GPORTAL_PASSWORD.
- Every search walks all result pages; narrow the time range for large datasets.";

fn main() {
    let args: Vec<String> = env::args().collect();
    if args.len() == 1 {
        eprintln!("{USAGE}");
        return;
    }

    let client = Client::default_client().expect("create client");

    match args.get(1).map(|s| s.as_str()) {
        Some("search") => {
            let criteria = criteria_from_args(&args[2..]);
            let search = match client.search(&criteria) {
                Ok(search) => search,
                Err(e) => fail(&format!("invalid search: {e}")),
            };

            match search.matched() {
                Ok(n) => println!("{n} products matched"),
                Err(e) => fail(&format!("search failed: {e}")),
            }
            for product in search.products() {
                match product {
                    Ok(p) => println!(
                        "{id}\t{start}\t{path}",
                        id = p.id().unwrap_or("-"),
                        start = p.start_time().unwrap_or("-"),
                        path = p.data_path().unwrap_or("-"),
                    ),
                    Err(e) => fail(&format!("search failed: {e}")),
                }
            }
        }

        Some("datasets") => match client.datasets() {
            Ok(tree) => match serde_json::to_string_pretty(&tree) {
                Ok(json) => println!("{json}"),
                Err(e) => fail(&format!("cannot encode tree: {e}")),
            },
            Err(e) => {
                eprintln!("datasets failed: {e}");
                eprintln!("Tip: the dataset tree endpoint is undocumented; it may have moved.");
                std::process::exit(1);
            }
        },

        Some("download") => {
            let Some(dir) = args.get(3) else {
                fail("download needs <datasetId> <dir>");
            };
            let limit: usize = args
                .get(4)
                .map(|s| s.parse().unwrap_or_else(|_| fail("limit must be a number")))
                .unwrap_or(1);
            let mut rest = vec![args[2].clone()];
            rest.extend(args.iter().skip(5).cloned());
            let criteria = criteria_from_args(&rest);

            let search = match client.search(&criteria) {
                Ok(search) => search,
                Err(e) => fail(&format!("invalid search: {e}")),
            };
            let products = match search.products().take(limit).collect::<gportal::Result<Vec<_>>>() {
                Ok(products) => products,
                Err(e) => fail(&format!("search failed: {e}")),
            };

            let config = match SftpConfig::from_env() {
                Ok(config) => config,
                Err(e) => fail(&e.to_string()),
            };
            let sftp = match SftpClient::connect(&config) {
                Ok(sftp) => sftp,
                Err(e) => fail(&format!("sftp connect failed: {e}")),
            };
            match sftp.download_products(&products, dir) {
                Ok(paths) => {
                    for path in paths {
                        println!("Downloaded {}", path.display());
                    }
                }
                Err(e) => fail(&format!("download failed: {e}")),
            }
            if let Err(e) = sftp.close() {
                eprintln!("closing sftp session: {e}");
            }
        }
        _ => {
            eprintln!("Unknown command. Use: search|datasets|download");
            std::process::exit(2);
        }
    }
}

fn criteria_from_args(args: &[String]) -> SearchCriteria {
    let Some(dataset_id) = args.first() else {
        fail("missing <datasetId>");
    };
    let mut criteria = SearchCriteria::new().dataset_ids([dataset_id]);
    if let Some(start) = args.get(1) {
        criteria = criteria.start_time(start.as_str());
    }
    if let Some(end) = args.get(2) {
        criteria = criteria.end_time(end.as_str());
    }
    if let Some(bbox) = args.get(3) {
        let values: Vec<f64> = bbox
            .split(',')
            .map(|v| v.trim().parse().unwrap_or_else(|_| fail("bbox must be 4 numbers")))
            .collect();
        criteria = criteria.bbox(values);
    }
    criteria
}

fn fail(msg: &str) -> ! {
    eprintln!("{msg}");
    std::process::exit(1);
}
