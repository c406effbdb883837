//! VNPay gateway adapter.
//!
//! Encapsulates the gateway's URL-construction and signature rules. The
//! gateway recomputes the HMAC over its own sort of the query parameters, so
//! the sorted-by-key canonical form here is load-bearing: a URL whose pairs
//! were serialized in any other order is rejected remotely.

use chrono::Utc;
use hmac::{Hmac, Mac};
use rust_decimal::prelude::ToPrimitive;
use rust_decimal::Decimal;
use sha2::Sha512;
use std::collections::{BTreeMap, HashMap};
use tracing::warn;
use uuid::Uuid;

use crate::config::VnpayConfig;
use crate::errors::ServiceError;

type HmacSha512 = Hmac<Sha512>;

pub const SECURE_HASH_FIELD: &str = "vnp_SecureHash";
pub const SECURE_HASH_TYPE_FIELD: &str = "vnp_SecureHashType";
pub const TXN_REF_FIELD: &str = "vnp_TxnRef";
pub const RESPONSE_CODE_FIELD: &str = "vnp_ResponseCode";
pub const TRANSACTION_STATUS_FIELD: &str = "vnp_TransactionStatus";

/// Both the response code and the transaction status must equal this sentinel
/// for a callback to count as a successful payment. The two codes are
/// independent signals: a transaction can be processed but not settled.
const SUCCESS_SENTINEL: &str = "00";

const GATEWAY_API_VERSION: &str = "2.1.0";

/// Inputs for an outbound payment URL
#[derive(Debug, Clone)]
pub struct PaymentUrlRequest {
    pub amount: Decimal,
    pub payment_id: Uuid,
    pub order_info: String,
    pub client_ip: Option<String>,
}

#[derive(Clone)]
pub struct VnpayGateway {
    config: VnpayConfig,
}

impl VnpayGateway {
    pub fn new(config: VnpayConfig) -> Self {
        Self { config }
    }

    /// Builds the signed redirect URL for the hosted payment page.
    ///
    /// The transaction reference round-tripped by the gateway is the opaque
    /// `payment_id`; internal identifiers never appear in the URL.
    pub fn build_payment_url(&self, request: &PaymentUrlRequest) -> Result<String, ServiceError> {
        // The gateway expresses amounts in minor units
        let amount_minor = (request.amount * Decimal::from(100))
            .trunc()
            .to_i64()
            .filter(|minor| *minor > 0)
            .ok_or_else(|| {
                ServiceError::InvalidInput(format!(
                    "Payment amount {} is not representable",
                    request.amount
                ))
            })?;

        let mut params = BTreeMap::new();
        params.insert("vnp_Version".to_string(), GATEWAY_API_VERSION.to_string());
        params.insert("vnp_Command".to_string(), "pay".to_string());
        params.insert("vnp_TmnCode".to_string(), self.config.tmn_code.clone());
        params.insert("vnp_Amount".to_string(), amount_minor.to_string());
        params.insert("vnp_CurrCode".to_string(), "VND".to_string());
        params.insert(
            TXN_REF_FIELD.to_string(),
            request.payment_id.to_string(),
        );
        params.insert("vnp_OrderInfo".to_string(), request.order_info.clone());
        params.insert(
            "vnp_OrderType".to_string(),
            self.config.order_type.clone(),
        );
        params.insert("vnp_Locale".to_string(), self.config.locale.clone());
        params.insert(
            "vnp_ReturnUrl".to_string(),
            self.config.return_url.clone(),
        );
        params.insert(
            "vnp_IpAddr".to_string(),
            request.client_ip.clone().unwrap_or_else(|| "127.0.0.1".to_string()),
        );
        params.insert(
            "vnp_CreateDate".to_string(),
            Utc::now().format("%Y%m%d%H%M%S").to_string(),
        );

        let canonical = canonical_query(&params);
        let signature = self.sign(&canonical).ok_or_else(|| {
            ServiceError::InternalError("Payment gateway hash secret is not configured".to_string())
        })?;

        Ok(format!(
            "{}?{}&{}={}",
            self.config.payment_url, canonical, SECURE_HASH_FIELD, signature
        ))
    }

    /// Validates an inbound callback against the shared secret.
    ///
    /// Strips the hash fields, re-canonicalizes the rest, recomputes the HMAC
    /// and compares in constant time. Any malformed or incomplete input
    /// yields `false`; this path sees garbage traffic and must not error.
    pub fn validate_callback(&self, params: &HashMap<String, String>) -> bool {
        let supplied = match params.get(SECURE_HASH_FIELD) {
            Some(hash) if !hash.is_empty() => hash,
            _ => return false,
        };

        let signed: BTreeMap<String, String> = params
            .iter()
            .filter(|(key, _)| {
                key.as_str() != SECURE_HASH_FIELD && key.as_str() != SECURE_HASH_TYPE_FIELD
            })
            .map(|(key, value)| (key.clone(), value.clone()))
            .collect();

        if signed.is_empty() {
            return false;
        }

        match self.sign(&canonical_query(&signed)) {
            Some(expected) => constant_time_eq(&expected, supplied),
            None => {
                warn!("Gateway callback received but no hash secret is configured");
                false
            }
        }
    }

    /// A callback reports a successful payment only when both gateway codes
    /// agree on the success sentinel.
    pub fn is_success(params: &HashMap<String, String>) -> bool {
        params.get(RESPONSE_CODE_FIELD).map(String::as_str) == Some(SUCCESS_SENTINEL)
            && params.get(TRANSACTION_STATUS_FIELD).map(String::as_str) == Some(SUCCESS_SENTINEL)
    }

    /// Decodes a raw callback query string into owned pairs
    pub fn parse_query(raw: &str) -> HashMap<String, String> {
        url::form_urlencoded::parse(raw.as_bytes())
            .into_owned()
            .collect()
    }

    fn sign(&self, data: &str) -> Option<String> {
        if self.config.hash_secret.is_empty() {
            return None;
        }
        let mut mac = HmacSha512::new_from_slice(self.config.hash_secret.as_bytes()).ok()?;
        mac.update(data.as_bytes());
        Some(hex::encode(mac.finalize().into_bytes()))
    }
}

/// Serializes parameters sorted by key with url-encoded keys and values.
/// The BTreeMap supplies the sort; the gateway applies the same one.
fn canonical_query(params: &BTreeMap<String, String>) -> String {
    let mut serializer = url::form_urlencoded::Serializer::new(String::new());
    for (key, value) in params {
        serializer.append_pair(key, value);
    }
    serializer.finish()
}

fn constant_time_eq(a: &str, b: &str) -> bool {
    if a.len() != b.len() {
        return false;
    }
    let mut res = 0u8;
    for (x, y) in a.as_bytes().iter().zip(b.as_bytes()) {
        res |= x ^ y;
    }
    res == 0
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    fn gateway() -> VnpayGateway {
        VnpayGateway::new(VnpayConfig {
            tmn_code: "RESIMART".to_string(),
            hash_secret: "test-hash-secret-for-unit-tests".to_string(),
            ..VnpayConfig::default()
        })
    }

    fn build_and_parse(gw: &VnpayGateway) -> HashMap<String, String> {
        let url = gw
            .build_payment_url(&PaymentUrlRequest {
                amount: dec!(125000.50),
                payment_id: Uuid::new_v4(),
                order_info: "Thanh toan don hang cho phong 1204".to_string(),
                client_ip: Some("10.0.0.8".to_string()),
            })
            .unwrap();
        let query = url.split_once('?').unwrap().1;
        VnpayGateway::parse_query(query)
    }

    #[test]
    fn build_then_validate_roundtrips() {
        let gw = gateway();
        let params = build_and_parse(&gw);
        assert!(gw.validate_callback(&params));
    }

    #[test]
    fn amount_is_expressed_in_minor_units() {
        let gw = gateway();
        let params = build_and_parse(&gw);
        assert_eq!(params["vnp_Amount"], "12500050");
    }

    #[test]
    fn tampered_field_fails_validation() {
        let gw = gateway();
        let mut params = build_and_parse(&gw);
        params.insert("vnp_Amount".to_string(), "1".to_string());
        assert!(!gw.validate_callback(&params));
    }

    #[test]
    fn validation_is_invariant_to_parameter_order() {
        // HashMap iteration order differs run to run; validation re-sorts, so
        // rebuilding the map from shuffled pairs must not change the verdict.
        let gw = gateway();
        let params = build_and_parse(&gw);
        let mut pairs: Vec<(String, String)> = params.into_iter().collect();
        pairs.reverse();
        let reordered: HashMap<String, String> = pairs.into_iter().collect();
        assert!(gw.validate_callback(&reordered));
    }

    #[test]
    fn missing_or_empty_signature_fails() {
        let gw = gateway();
        let mut params = build_and_parse(&gw);
        params.remove(SECURE_HASH_FIELD);
        assert!(!gw.validate_callback(&params));

        params.insert(SECURE_HASH_FIELD.to_string(), String::new());
        assert!(!gw.validate_callback(&params));
    }

    #[test]
    fn garbage_input_fails_without_panicking() {
        let gw = gateway();
        let params = VnpayGateway::parse_query("not&really=a%%%query&vnp_SecureHash=zz");
        assert!(!gw.validate_callback(&params));
    }

    #[test]
    fn empty_secret_never_validates() {
        let gw = VnpayGateway::new(VnpayConfig::default());
        let signed = gateway();
        let params = build_and_parse(&signed);
        assert!(!gw.validate_callback(&params));
    }

    #[test]
    fn unconfigured_secret_cannot_build_urls() {
        let gw = VnpayGateway::new(VnpayConfig::default());
        let result = gw.build_payment_url(&PaymentUrlRequest {
            amount: dec!(10),
            payment_id: Uuid::new_v4(),
            order_info: "x".to_string(),
            client_ip: None,
        });
        assert!(result.is_err());
    }

    #[test]
    fn success_requires_both_codes() {
        let mut params = HashMap::new();
        params.insert(RESPONSE_CODE_FIELD.to_string(), "00".to_string());
        assert!(!VnpayGateway::is_success(&params));

        params.insert(TRANSACTION_STATUS_FIELD.to_string(), "02".to_string());
        assert!(!VnpayGateway::is_success(&params));

        params.insert(TRANSACTION_STATUS_FIELD.to_string(), "00".to_string());
        assert!(VnpayGateway::is_success(&params));
    }

    #[test]
    fn non_positive_amount_is_rejected() {
        let gw = gateway();
        let result = gw.build_payment_url(&PaymentUrlRequest {
            amount: dec!(0),
            payment_id: Uuid::new_v4(),
            order_info: "x".to_string(),
            client_ip: None,
        });
        assert!(result.is_err());
    }
}
