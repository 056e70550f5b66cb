use crate::cert::key::{self, CertificateIdentity, DerivationMode, KeyInputs, StorageKey};
use crate::cert::SerialNumber;
use crate::utils::errors::{Result, VaultPkiError};
use base64::{engine::general_purpose, Engine as _};
use chrono::{DateTime, Utc};
use x509_parser::der_parser::oid;
use x509_parser::prelude::*;

// X.509 Extension OIDs
const SUBJECT_ALT_NAME_OID: oid::Oid = oid!(2.5.29 .17);

/// Fields of a certificate that key derivation and reporting care about
#[derive(Debug, Clone)]
pub struct CertificateInfo {
    pub common_name: String,
    pub serial: SerialNumber,
    pub issuer: String,
    pub not_before: DateTime<Utc>,
    pub not_after: DateTime<Utc>,
    pub dns_names: Vec<String>,
    pub ip_addresses: Vec<String>,
}

impl CertificateInfo {
    /// Identity tuple for content-hash keys: CN plus DNS SANs
    pub fn identity(&self, zone: &str) -> CertificateIdentity {
        CertificateIdentity::new(&self.common_name, self.dns_names.iter().cloned(), zone)
    }

    /// Inputs for every derivation mode, filled from this certificate
    pub fn key_inputs(&self, zone: Option<&str>) -> KeyInputs {
        KeyInputs {
            common_name: Some(self.common_name.clone()),
            serial: Some(self.serial.as_colon_hex()),
            alt_names: self.dns_names.iter().cloned().collect(),
            zone: zone.map(str::to_string),
        }
    }

    pub fn storage_key(&self, mode: DerivationMode, zone: Option<&str>) -> Result<StorageKey> {
        Ok(key::derive(mode, &self.key_inputs(zone))?)
    }

    pub fn is_expired(&self) -> bool {
        Utc::now() > self.not_after
    }

    /// Whole days left before expiry, negative once expired
    pub fn days_until_expiry(&self) -> i64 {
        (self.not_after - Utc::now()).num_days()
    }

    pub fn expires_within(&self, days: u32) -> bool {
        let threshold = Utc::now() + chrono::Duration::days(days as i64);
        self.not_after <= threshold
    }

    /// All SANs as displayed to the user, DNS names first
    pub fn sans(&self) -> Vec<String> {
        self.dns_names
            .iter()
            .chain(self.ip_addresses.iter())
            .cloned()
            .collect()
    }
}

pub struct CertificateParser;

impl CertificateParser {
    /// Parse the first certificate of a PEM blob
    pub fn parse_pem(pem_data: &str) -> Result<CertificateInfo> {
        let cert_data = Self::extract_cert_from_pem(pem_data)?;

        let der_bytes = general_purpose::STANDARD
            .decode(&cert_data)
            .map_err(|e| VaultPkiError::CertParsing(format!("Base64 decode error: {e}")))?;

        let (_, cert) = X509Certificate::from_der(&der_bytes)
            .map_err(|e| VaultPkiError::CertParsing(format!("DER parsing error: {e}")))?;

        Self::extract_info(&cert)
    }

    /// Extract certificate data from PEM format
    fn extract_cert_from_pem(pem_data: &str) -> Result<String> {
        let mut in_cert = false;
        let mut cert_lines = Vec::new();

        for line in pem_data.lines() {
            let line = line.trim();
            if line == "-----BEGIN CERTIFICATE-----" {
                in_cert = true;
                continue;
            } else if line == "-----END CERTIFICATE-----" {
                break;
            } else if in_cert {
                cert_lines.push(line);
            }
        }

        if cert_lines.is_empty() {
            return Err(VaultPkiError::CertParsing(
                "No certificate data found in PEM".to_string(),
            ));
        }

        Ok(cert_lines.join(""))
    }

    fn extract_info(cert: &X509Certificate) -> Result<CertificateInfo> {
        let serial = SerialNumber::from_bytes(&cert.serial.to_bytes_be());

        let common_name = cert
            .subject()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or_default()
            .to_string();

        let issuer = cert
            .issuer()
            .iter_common_name()
            .next()
            .and_then(|cn| cn.as_str().ok())
            .unwrap_or("Unknown")
            .to_string();

        let not_before = DateTime::from_timestamp(cert.validity().not_before.timestamp(), 0)
            .ok_or_else(|| VaultPkiError::CertParsing("Invalid notBefore date".to_string()))?;
        let not_after = DateTime::from_timestamp(cert.validity().not_after.timestamp(), 0)
            .ok_or_else(|| VaultPkiError::CertParsing("Invalid notAfter date".to_string()))?;

        let mut dns_names = Vec::new();
        let mut ip_addresses = Vec::new();
        for ext in cert.extensions() {
            if ext.oid == SUBJECT_ALT_NAME_OID {
                if let Ok((_rem, san)) = SubjectAlternativeName::from_der(ext.value) {
                    for name in &san.general_names {
                        match name {
                            GeneralName::DNSName(dns) => dns_names.push(dns.to_string()),
                            GeneralName::IPAddress(ip) => {
                                if let Some(addr) = format_ip(ip) {
                                    ip_addresses.push(addr);
                                }
                            }
                            _ => {}
                        }
                    }
                }
                break;
            }
        }

        tracing::trace!(
            "Parsed certificate CN='{}' serial={} sans={:?}",
            common_name,
            serial,
            dns_names
        );

        Ok(CertificateInfo {
            common_name,
            serial,
            issuer,
            not_before,
            not_after,
            dns_names,
            ip_addresses,
        })
    }
}

fn format_ip(ip: &[u8]) -> Option<String> {
    match ip.len() {
        4 => Some(format!("{}.{}.{}.{}", ip[0], ip[1], ip[2], ip[3])),
        16 => {
            let octets: [u8; 16] = ip.try_into().ok()?;
            Some(std::net::Ipv6Addr::from(octets).to_string())
        }
        _ => None,
    }
}
