use crate::cert::{
    derive, CertificateInfo, CertificateParser, CertificateRecord, DerivationMode, KeyInputs,
    StorageKey,
};
use crate::cli::args::*;
use crate::utils::config::Config;
use crate::utils::errors::{Result, VaultPkiError};
use crate::utils::output::OutputFormat;
use crate::vault::auth::{resolve_token, token_hint};
use crate::vault::client::VaultClient;
use crate::vault::store::CertificateStore;
use clap::CommandFactory;
use clap_complete::generate;
use std::fs;
use std::io;
use std::path::Path;

/// Records expiring within this many days are flagged when no window is given
const EXPIRY_WARNING_DAYS: u32 = 30;

pub async fn handle_command(cli: Cli) -> Result<()> {
    // Initialize logging - always to stderr
    if !cli.quiet {
        let log_level = match cli.verbose {
            0 => "vault_pki_keys=warn",
            1 => "vault_pki_keys=info",
            2 => "vault_pki_keys=debug",
            _ => "vault_pki_keys=trace",
        };

        tracing_subscriber::fmt()
            .with_writer(io::stderr)
            .with_env_filter(log_level)
            .init();
    }

    let output = OutputFormat::new(cli.raw);

    if let Commands::Completion { shell } = cli.command {
        let mut cmd = Cli::command();
        generate(shell, &mut cmd, "vault-pki-keys", &mut io::stdout());
        return Ok(());
    }

    let config = Config::load(cli.config.as_deref())?.with_overrides(Config {
        vault_addr: cli.vault_addr.clone(),
        ..Config::default()
    });

    match cli.command {
        Commands::Key { ref select } => handle_key_command(select, config, &output),
        Commands::Show { ref select, pem } => {
            handle_show_command(select, pem, config, &cli, &output).await
        }
        Commands::Update {
            store_by,
            ref zone,
            ref prefix,
            ref cert_file,
            ref key_file,
            ref chain_file,
            dry_run,
        } => {
            let config = config.with_overrides(Config {
                vault_addr: None,
                prefix: prefix.clone(),
                zone: zone.clone(),
                store_by,
            });
            let files = UpdateFiles {
                cert_file,
                key_file,
                chain_file: chain_file.as_deref(),
            };
            handle_update_command(files, dry_run, config, &cli).await
        }
        Commands::List {
            ref prefix,
            expires_within,
        } => {
            let config = config.with_overrides(Config {
                prefix: prefix.clone(),
                ..Config::default()
            });
            handle_list_command(expires_within, config, &cli, &output).await
        }
        Commands::Completion { .. } => Ok(()),
    }
}

fn handle_key_command(select: &KeySelector, config: Config, output: &OutputFormat) -> Result<()> {
    let config = apply_selector(config, select);
    let key = resolve_key(select, &config)?;

    match config.prefix.as_deref() {
        Some(prefix) if !output.raw => {
            let path = key.record_path(prefix);
            output.print_key_value(&[("key", key.as_str()), ("path", path.as_str())]);
        }
        Some(prefix) => println!("{}\t{}", key, key.record_path(prefix)),
        None => println!("{key}"),
    }
    Ok(())
}

async fn handle_show_command(
    select: &KeySelector,
    pem: bool,
    config: Config,
    cli: &Cli,
    output: &OutputFormat,
) -> Result<()> {
    let config = apply_selector(config, select);
    let key = resolve_key(select, &config)?;
    let store = connect_store(&config, cli)?;
    let path = store.record_path(&key);

    let record = store
        .read_record(&key)
        .await?
        .ok_or_else(|| VaultPkiError::CertNotFound(format!("No certificate record at {path}")))?;

    if pem {
        println!("{}", record.certificate);
        if record.has_chain() {
            println!("{}", record.certificate_chain);
        }
        return Ok(());
    }

    let info = record.info()?;
    warn_on_key_mismatch(&info, &key, &config);

    let pairs = vec![
        ("key", key.to_string()),
        ("path", path),
        ("cn", info.common_name.clone()),
        ("serial", info.serial.to_string()),
        ("issuer", info.issuer.clone()),
        ("not_before", info.not_before.format("%Y-%m-%d %H:%M").to_string()),
        ("not_after", info.not_after.format("%Y-%m-%d %H:%M").to_string()),
        ("days_left", info.days_until_expiry().to_string()),
        ("sans", info.sans().join(",")),
        ("chain", yes_no(record.has_chain()).to_string()),
        ("private_key", yes_no(!record.private_key.is_empty()).to_string()),
    ];
    output.print_key_value(&pairs);
    Ok(())
}

struct UpdateFiles<'a> {
    cert_file: &'a Path,
    key_file: &'a Path,
    chain_file: Option<&'a Path>,
}

async fn handle_update_command(
    files: UpdateFiles<'_>,
    dry_run: bool,
    config: Config,
    cli: &Cli,
) -> Result<()> {
    let certificate = read_pem_file(files.cert_file)?;
    let private_key = read_pem_file(files.key_file)?;
    if !private_key.contains("PRIVATE KEY-----") {
        return Err(VaultPkiError::InvalidInput(format!(
            "{} does not contain a PEM private key",
            files.key_file.display()
        )));
    }
    let chain = match files.chain_file {
        Some(path) => read_pem_file(path)?,
        None => String::new(),
    };

    let record = CertificateRecord::from_pem(&certificate, &chain, &private_key)?;
    let info = record.info()?;
    let mode = config.mode();
    let key = info.storage_key(mode, config.zone.as_deref())?;
    let prefix = config.require_prefix()?;
    let path = key.record_path(prefix);
    tracing::info!("Derived {mode} key '{key}' for CN '{}'", info.common_name);

    if dry_run {
        println!("{path}");
        println!("{}", serde_json::to_string_pretty(&record.redacted())?);
        return Ok(());
    }

    let store = connect_store(&config, cli)?;
    match store.read_record(&key).await {
        Ok(Some(existing)) => match existing.info() {
            Ok(old) => tracing::info!(
                "Replacing record for CN '{}' (serial {}, expires {})",
                old.common_name,
                old.serial,
                old.not_after.format("%Y-%m-%d")
            ),
            Err(e) => tracing::warn!("Existing record at {path} is unreadable: {e}"),
        },
        Ok(None) => tracing::info!("No record at {path} yet, creating it"),
        Err(VaultPkiError::Json(e)) => {
            tracing::warn!("Existing record at {path} is unreadable, overwriting it: {e}")
        }
        Err(e) => return Err(e),
    }

    store.write_record(&key, &record).await?;
    if !cli.quiet {
        println!("Updated {path}");
    }
    Ok(())
}

async fn handle_list_command(
    expires_within: Option<u32>,
    config: Config,
    cli: &Cli,
    output: &OutputFormat,
) -> Result<()> {
    let store = connect_store(&config, cli)?;
    let threshold = expires_within.unwrap_or(EXPIRY_WARNING_DAYS);
    let entries = list_entries(&store, expires_within).await?;

    let rows: Vec<Vec<String>> = entries
        .iter()
        .map(|(key, info)| {
            vec![
                key.clone(),
                info.common_name.clone(),
                info.serial.to_string(),
                info.not_after.format("%Y-%m-%d %H:%M").to_string(),
                info.days_until_expiry().to_string(),
                expiry_status(info, threshold).to_string(),
            ]
        })
        .collect();

    output.print_table(&rows);
    Ok(())
}

/// Readable records under the store's prefix, soonest expiry first
async fn list_entries(
    store: &CertificateStore,
    expires_within: Option<u32>,
) -> Result<Vec<(String, CertificateInfo)>> {
    let keys = store.list_keys().await?;
    tracing::debug!("Found {} records under {}", keys.len(), store.prefix());

    let mut entries: Vec<(String, CertificateInfo)> = Vec::new();

    for key in keys {
        let storage_key = StorageKey::from_stored(&key);
        let info = match store.read_record(&storage_key).await {
            Ok(Some(record)) => match record.info() {
                Ok(info) => info,
                Err(e) => {
                    tracing::warn!("Skipping {key}: {e}");
                    continue;
                }
            },
            Ok(None) => {
                tracing::warn!("Skipping {key}: record disappeared");
                continue;
            }
            Err(VaultPkiError::Auth(msg)) => return Err(VaultPkiError::Auth(msg)),
            Err(e) => {
                tracing::warn!("Skipping {key}: {e}");
                continue;
            }
        };

        if let Some(days) = expires_within {
            if !info.expires_within(days) {
                continue;
            }
        }
        entries.push((key, info));
    }

    entries.sort_by(|a, b| a.1.not_after.cmp(&b.1.not_after));
    Ok(entries)
}

/// Overlay the selector's flags on the loaded configuration
fn apply_selector(config: Config, select: &KeySelector) -> Config {
    config.with_overrides(Config {
        vault_addr: None,
        prefix: select.prefix.clone(),
        zone: select.zone.clone(),
        store_by: select.store_by,
    })
}

fn resolve_key(select: &KeySelector, config: &Config) -> Result<StorageKey> {
    let info = match &select.cert_file {
        Some(path) => Some(CertificateParser::parse_pem(&read_pem_file(path)?)?),
        None => None,
    };

    let inputs = key_inputs(select, info.as_ref(), config.zone.as_deref());
    let mode = config.mode();
    let key = derive(mode, &inputs)?;
    tracing::debug!("Derived {mode} key: {key}");
    Ok(key)
}

/// Merge explicit flags with values read from a certificate; flags win
fn key_inputs(
    select: &KeySelector,
    info: Option<&CertificateInfo>,
    zone: Option<&str>,
) -> KeyInputs {
    let mut inputs = info
        .map(|info| info.key_inputs(zone))
        .unwrap_or_else(|| KeyInputs {
            zone: zone.map(str::to_string),
            ..KeyInputs::default()
        });

    if let Some(cn) = &select.cn {
        inputs.common_name = Some(cn.clone());
    }
    if let Some(serial) = &select.serial {
        inputs.serial = Some(serial.trim().to_string());
    }

    let alt_names: Vec<String> = select
        .alt_names
        .iter()
        .map(|name| name.trim())
        .filter(|name| !name.is_empty())
        .map(str::to_string)
        .collect();
    if !alt_names.is_empty() {
        inputs.alt_names = alt_names.into_iter().collect();
    }

    inputs
}

fn connect_store(config: &Config, cli: &Cli) -> Result<CertificateStore> {
    let vault_addr = config.require_vault_addr()?;
    let prefix = config.require_prefix()?;
    let token = resolve_token(cli.token.as_deref())?;
    tracing::debug!("Using token: {}", token_hint(&token));

    let client = VaultClient::new(vault_addr, &token)?;
    Ok(CertificateStore::new(client, prefix))
}

/// Log when a stored certificate would not be addressed by the key it sits under
fn warn_on_key_mismatch(info: &CertificateInfo, key: &StorageKey, config: &Config) {
    let mode = config.mode();
    if mode == DerivationMode::ByContentHash && config.zone.is_none() {
        return;
    }
    match info.storage_key(mode, config.zone.as_deref()) {
        Ok(expected) if &expected != key => tracing::warn!(
            "Record at '{key}' holds a certificate whose {mode} key is '{expected}'"
        ),
        Ok(_) => {}
        Err(e) => tracing::debug!("Cannot re-derive key from stored certificate: {e}"),
    }
}

fn read_pem_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        VaultPkiError::InvalidInput(format!("Cannot read {}: {e}", path.display()))
    })
}

fn expiry_status(info: &CertificateInfo, threshold: u32) -> &'static str {
    if info.is_expired() {
        "EXPIRED"
    } else if info.expires_within(threshold) {
        "EXPIRING"
    } else {
        "OK"
    }
}

fn yes_no(value: bool) -> &'static str {
    if value {
        "yes"
    } else {
        "no"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};
    use clap::Parser;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    const LEAF_PEM: &str = include_str!("../cert/testdata/leaf.pem");
    const LEAF_KEY: &str = include_str!("../cert/testdata/leaf.key");
    const EXPIRED_PEM: &str = include_str!("../cert/testdata/expired.pem");
    const SOON_PEM: &str = include_str!("../cert/testdata/soon.pem");
    const LEAF_PEM_FILE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/cert/testdata/leaf.pem");
    const LEAF_KEY_FILE: &str = concat!(env!("CARGO_MANIFEST_DIR"), "/src/cert/testdata/leaf.key");
    const CERTS_PATH: &str = "/v1/sys/raw/logical/pki-uuid/certs";

    fn leaf() -> CertificateInfo {
        CertificateParser::parse_pem(LEAF_PEM).unwrap()
    }

    #[test]
    fn test_key_inputs_from_flags() {
        let select = KeySelector {
            cn: Some("example.com".to_string()),
            alt_names: vec![" www.example.com".to_string(), String::new()],
            ..KeySelector::default()
        };
        let inputs = key_inputs(&select, None, Some("Default"));
        assert_eq!(inputs.common_name.as_deref(), Some("example.com"));
        assert_eq!(inputs.alt_names.len(), 1);
        assert!(inputs.alt_names.contains("www.example.com"));
        assert_eq!(inputs.zone.as_deref(), Some("Default"));
    }

    #[test]
    fn test_key_inputs_flags_override_certificate() {
        let info = leaf();
        let select = KeySelector {
            cn: Some("override.example.com".to_string()),
            ..KeySelector::default()
        };
        let inputs = key_inputs(&select, Some(&info), None);
        assert_eq!(inputs.common_name.as_deref(), Some("override.example.com"));
        assert_eq!(inputs.serial.as_deref(), Some("aa:01:ff"));
        assert_eq!(inputs.alt_names.len(), 2);
    }

    #[test]
    fn test_serial_from_file_and_flag_agree() {
        let config = Config {
            store_by: Some(DerivationMode::BySerial),
            ..Config::default()
        };
        let inputs = key_inputs(&KeySelector::default(), Some(&leaf()), None);
        let from_file = derive(config.mode(), &inputs).unwrap();
        let from_flag = resolve_key(
            &KeySelector {
                serial: Some("AA:01:FF".to_string()),
                ..KeySelector::default()
            },
            &config,
        )
        .unwrap();
        assert_eq!(from_file, from_flag);
        assert_eq!(from_flag.as_str(), "aa-01-ff");
    }

    #[test]
    fn test_resolve_key_reports_invalid_input() {
        let config = Config {
            store_by: Some(DerivationMode::ByContentHash),
            zone: Some("Z".to_string()),
            ..Config::default()
        };
        assert!(matches!(
            resolve_key(&KeySelector::default(), &config),
            Err(VaultPkiError::Derive(_))
        ));
    }

    #[test]
    fn test_apply_selector() {
        let config = Config {
            prefix: Some("logical/file".to_string()),
            zone: Some("FileZone".to_string()),
            ..Config::default()
        };
        let select = KeySelector {
            store_by: Some(DerivationMode::ByContentHash),
            zone: Some("FlagZone".to_string()),
            ..KeySelector::default()
        };
        let merged = apply_selector(config, &select);
        assert_eq!(merged.prefix.as_deref(), Some("logical/file"));
        assert_eq!(merged.zone.as_deref(), Some("FlagZone"));
        assert_eq!(merged.mode(), DerivationMode::ByContentHash);
    }

    #[test]
    fn test_expiry_status() {
        let mut info = leaf();
        info.not_after = chrono::Utc::now() - chrono::Duration::days(1);
        assert_eq!(expiry_status(&info, 30), "EXPIRED");
        info.not_after = chrono::Utc::now() + chrono::Duration::days(10);
        assert_eq!(expiry_status(&info, 30), "EXPIRING");
        assert_eq!(expiry_status(&info, 5), "OK");
    }

    #[test]
    fn test_read_pem_file_missing() {
        assert!(matches!(
            read_pem_file(Path::new("/nonexistent/cert.pem")),
            Err(VaultPkiError::InvalidInput(_))
        ));
    }

    fn test_cli(args: &[&str]) -> Cli {
        let mut argv = vec!["vault-pki-keys", "--token", "s.testtoken123"];
        argv.extend_from_slice(args);
        Cli::try_parse_from(argv).unwrap()
    }

    fn test_config(server: &MockServer) -> Config {
        Config {
            vault_addr: Some(server.uri()),
            prefix: Some("logical/pki-uuid".to_string()),
            ..Config::default()
        }
    }

    fn record_body(pem: &str) -> serde_json::Value {
        let record = CertificateRecord::from_pem(pem, "", LEAF_KEY).unwrap();
        json!({"data": {"value": record.to_json().unwrap()}})
    }

    async fn mount_record(server: &MockServer, key: &str, body: serde_json::Value) {
        Mock::given(method("GET"))
            .and(path(format!("{CERTS_PATH}/{key}")))
            .respond_with(ResponseTemplate::new(200).set_body_json(body))
            .mount(server)
            .await;
    }

    async fn mount_listing(server: &MockServer, keys: &[&str]) {
        Mock::given(method("LIST"))
            .and(path(format!("{CERTS_PATH}/")))
            .respond_with(
                ResponseTemplate::new(200).set_body_json(json!({"data": {"keys": keys}})),
            )
            .mount(server)
            .await;
    }

    fn update_files() -> UpdateFiles<'static> {
        UpdateFiles {
            cert_file: Path::new(LEAF_PEM_FILE),
            key_file: Path::new(LEAF_KEY_FILE),
            chain_file: None,
        }
    }

    #[tokio::test]
    async fn test_list_entries_skips_unreadable_and_sorts_by_expiry() {
        let server = MockServer::start().await;
        mount_listing(
            &server,
            &["example.com", "broken", "old.example.com", "soon.example.com"],
        )
        .await;
        mount_record(&server, "example.com", record_body(LEAF_PEM)).await;
        mount_record(&server, "old.example.com", record_body(EXPIRED_PEM)).await;
        mount_record(&server, "soon.example.com", record_body(SOON_PEM)).await;
        mount_record(&server, "broken", json!({"data": {"value": "not json"}})).await;

        let store = connect_store(&test_config(&server), &test_cli(&["list"])).unwrap();
        let entries = list_entries(&store, None).await.unwrap();

        let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["old.example.com", "soon.example.com", "example.com"]);
        assert_eq!(expiry_status(&entries[0].1, 30), "EXPIRED");
        assert_eq!(expiry_status(&entries[2].1, 30), "OK");
    }

    #[tokio::test]
    async fn test_list_entries_expiry_window() {
        let server = MockServer::start().await;
        mount_listing(&server, &["example.com", "old.example.com", "soon.example.com"]).await;
        mount_record(&server, "example.com", record_body(LEAF_PEM)).await;
        mount_record(&server, "old.example.com", record_body(EXPIRED_PEM)).await;
        mount_record(&server, "soon.example.com", record_body(SOON_PEM)).await;

        // Window ending 2031-01-01 covers the expired and 2030 certificates only
        let cutoff = Utc.with_ymd_and_hms(2031, 1, 1, 0, 0, 0).unwrap();
        let days = u32::try_from((cutoff - Utc::now()).num_days()).unwrap();

        let store = connect_store(&test_config(&server), &test_cli(&["list"])).unwrap();
        let entries = list_entries(&store, Some(days)).await.unwrap();

        let keys: Vec<&str> = entries.iter().map(|(key, _)| key.as_str()).collect();
        assert_eq!(keys, vec!["old.example.com", "soon.example.com"]);
    }

    #[tokio::test]
    async fn test_list_forbidden_record_is_fatal() {
        let server = MockServer::start().await;
        mount_listing(&server, &["example.com", "secret"]).await;
        mount_record(&server, "example.com", record_body(LEAF_PEM)).await;
        Mock::given(method("GET"))
            .and(path(format!("{CERTS_PATH}/secret")))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;

        let cli = test_cli(&["list"]);
        let result =
            handle_list_command(None, test_config(&server), &cli, &OutputFormat::new(true)).await;
        assert!(matches!(result, Err(VaultPkiError::Auth(_))));
    }

    #[tokio::test]
    async fn test_show_missing_record() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path(format!("{CERTS_PATH}/missing.example.com")))
            .respond_with(ResponseTemplate::new(404))
            .expect(1)
            .mount(&server)
            .await;

        let select = KeySelector {
            cn: Some("missing.example.com".to_string()),
            ..KeySelector::default()
        };
        let cli = test_cli(&["show", "--cn", "missing.example.com"]);
        let result = handle_show_command(
            &select,
            false,
            test_config(&server),
            &cli,
            &OutputFormat::new(true),
        )
        .await;
        assert!(matches!(result, Err(VaultPkiError::CertNotFound(_))));
    }

    #[tokio::test]
    async fn test_update_dry_run_does_not_touch_vault() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(404))
            .expect(0)
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let cli = test_cli(&["list"]);
        handle_update_command(update_files(), true, test_config(&server), &cli)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_overwrites_corrupt_record() {
        let server = MockServer::start().await;
        mount_record(&server, "example.com", json!({"data": {"value": "garbage"}})).await;
        Mock::given(method("PUT"))
            .and(path(format!("{CERTS_PATH}/example.com")))
            .respond_with(ResponseTemplate::new(204))
            .expect(1)
            .mount(&server)
            .await;

        let cli = test_cli(&["--quiet", "list"]);
        handle_update_command(update_files(), false, test_config(&server), &cli)
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_update_forbidden_read_is_fatal() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(403))
            .mount(&server)
            .await;
        Mock::given(method("PUT"))
            .respond_with(ResponseTemplate::new(204))
            .expect(0)
            .mount(&server)
            .await;

        let cli = test_cli(&["list"]);
        let result = handle_update_command(update_files(), false, test_config(&server), &cli).await;
        assert!(matches!(result, Err(VaultPkiError::Auth(_))));
    }
}
