//! AWS SQS provider implementation using the SQS Query API over HTTP.
//!
//! Requests are built as form-style query parameters, signed with AWS
//! Signature V4 and answered with XML documents parsed by `quick-xml`.
//! Calling the HTTP API directly keeps the provider testable against a mock
//! server and lets the endpoint point at LocalStack.
//!
//! ## Authentication
//!
//! Credentials come from [`AwsSqsConfig`] or, when absent there, from the
//! `AWS_ACCESS_KEY_ID`, `AWS_SECRET_ACCESS_KEY` and `AWS_SESSION_TOKEN`
//! environment variables. Without credentials every call fails with
//! [`QueueError::AuthenticationFailed`].
//!
//! ## Error mapping
//!
//! | SQS error code | Queue error |
//! |---|---|
//! | `AWS.SimpleQueueService.NonExistentQueue`, `QueueDoesNotExist` | `QueueNotFound` |
//! | `QueueAlreadyExists`, `QueueNameExists` | `QueueAlreadyExists` |
//! | `ReceiptHandleIsInvalid`, `InvalidReceiptHandle`, `MessageNotInflight` | `MessageNotFound` |
//! | `AccessDenied` | `PermissionDenied` |
//! | `InvalidClientTokenId`, `SignatureDoesNotMatch`, ... | `AuthenticationFailed` |
//! | other 4xx | `InvalidRequest` |
//! | 5xx | `ProviderError` (transient) |

use crate::attributes::{QueueAttribute, QueueAttributes};
use crate::client::QueueProvider;
use crate::error::{ConfigurationError, QueueError, SerializationError};
use crate::message::{
    Message, MessageId, QueueName, QueueUrl, ReceiptHandle, ReceiveOptions, ReceivedMessage,
    SendOptions, SendReceipt, Timestamp, MAX_WAIT_TIME_SECONDS,
};
use crate::provider::{AwsSqsConfig, ProviderType};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use hmac::{Hmac, Mac};
use reqwest::Client as HttpClient;
use sha2::{Digest, Sha256};
use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tracing::debug;

#[cfg(test)]
#[path = "aws_tests.rs"]
mod tests;

const API_VERSION: &str = "2012-11-05";
const PROVIDER_NAME: &str = "AwsSqs";

// ============================================================================
// AWS Signature V4 Signing
// ============================================================================

type HmacSha256 = Hmac<Sha256>;

/// Static credentials used to sign requests
#[derive(Clone)]
struct AwsCredentials {
    access_key: String,
    secret_key: String,
    session_token: Option<String>,
}

impl AwsCredentials {
    /// Resolve credentials from configuration, falling back to the environment
    fn resolve(config: &AwsSqsConfig) -> Option<Self> {
        let access_key = config
            .access_key_id
            .clone()
            .or_else(|| std::env::var("AWS_ACCESS_KEY_ID").ok())
            .filter(|key| !key.is_empty())?;
        let secret_key = config
            .secret_access_key
            .clone()
            .or_else(|| std::env::var("AWS_SECRET_ACCESS_KEY").ok())
            .filter(|key| !key.is_empty())?;
        let session_token = config
            .session_token
            .clone()
            .or_else(|| std::env::var("AWS_SESSION_TOKEN").ok())
            .filter(|token| !token.is_empty());

        Some(Self {
            access_key,
            secret_key,
            session_token,
        })
    }
}

/// AWS Signature Version 4 signer for request authentication
///
/// Implements the AWS Signature V4 signing process:
/// 1. Create canonical request (method, URI, query, headers, payload)
/// 2. Create string to sign (algorithm, timestamp, scope, request hash)
/// 3. Derive signing key (4-level HMAC chain)
/// 4. Calculate signature and build Authorization header
#[derive(Clone)]
struct AwsV4Signer {
    credentials: AwsCredentials,
    region: String,
    service: String,
}

impl AwsV4Signer {
    fn new(credentials: AwsCredentials, region: String) -> Self {
        Self {
            credentials,
            region,
            service: "sqs".to_string(),
        }
    }

    /// Sign a request and return the headers to attach to it
    fn sign_request(
        &self,
        method: &str,
        host: &str,
        path: &str,
        query_params: &BTreeMap<String, String>,
        body: &str,
        timestamp: &DateTime<Utc>,
    ) -> Result<Vec<(String, String)>, QueueError> {
        let date_stamp = timestamp.format("%Y%m%d").to_string();
        let amz_date = timestamp.format("%Y%m%dT%H%M%SZ").to_string();

        let canonical_query_string = canonical_query(query_params);

        // Canonical headers must be sorted by name
        let mut canonical_headers = format!("host:{}\nx-amz-date:{}\n", host, amz_date);
        let mut signed_headers = "host;x-amz-date".to_string();
        if let Some(token) = &self.credentials.session_token {
            canonical_headers.push_str(&format!("x-amz-security-token:{}\n", token));
            signed_headers.push_str(";x-amz-security-token");
        }

        let payload_hash = hex::encode(Sha256::digest(body.as_bytes()));

        let canonical_request = format!(
            "{}\n{}\n{}\n{}\n{}\n{}",
            method, path, canonical_query_string, canonical_headers, signed_headers, payload_hash
        );

        let algorithm = "AWS4-HMAC-SHA256";
        let credential_scope = format!(
            "{}/{}/{}/aws4_request",
            date_stamp, self.region, self.service
        );
        let canonical_request_hash = hex::encode(Sha256::digest(canonical_request.as_bytes()));

        let string_to_sign = format!(
            "{}\n{}\n{}\n{}",
            algorithm, amz_date, credential_scope, canonical_request_hash
        );

        let signature = self.calculate_signature(&string_to_sign, &date_stamp)?;

        let authorization_header = format!(
            "{} Credential={}/{}, SignedHeaders={}, Signature={}",
            algorithm, self.credentials.access_key, credential_scope, signed_headers, signature
        );

        let mut headers = vec![
            ("Authorization".to_string(), authorization_header),
            ("x-amz-date".to_string(), amz_date),
            ("host".to_string(), host.to_string()),
        ];
        if let Some(token) = &self.credentials.session_token {
            headers.push(("x-amz-security-token".to_string(), token.clone()));
        }

        Ok(headers)
    }

    /// Derive the signing key through the HMAC chain and sign
    fn calculate_signature(
        &self,
        string_to_sign: &str,
        date_stamp: &str,
    ) -> Result<String, QueueError> {
        let k_secret = format!("AWS4{}", self.credentials.secret_key);
        let k_date = hmac_sha256(k_secret.as_bytes(), date_stamp.as_bytes())?;
        let k_region = hmac_sha256(&k_date, self.region.as_bytes())?;
        let k_service = hmac_sha256(&k_region, self.service.as_bytes())?;
        let k_signing = hmac_sha256(&k_service, b"aws4_request")?;
        let signature = hmac_sha256(&k_signing, string_to_sign.as_bytes())?;

        Ok(hex::encode(signature))
    }
}

fn hmac_sha256(key: &[u8], data: &[u8]) -> Result<Vec<u8>, QueueError> {
    let mut mac =
        HmacSha256::new_from_slice(key).map_err(|e| QueueError::AuthenticationFailed {
            message: format!("signing key rejected: {}", e),
        })?;
    mac.update(data);
    Ok(mac.finalize().into_bytes().to_vec())
}

/// Query string with keys in byte order and RFC 3986 encoding
fn canonical_query(params: &BTreeMap<String, String>) -> String {
    params
        .iter()
        .map(|(k, v)| format!("{}={}", urlencoding::encode(k), urlencoding::encode(v)))
        .collect::<Vec<_>>()
        .join("&")
}

// ============================================================================
// XML Responses
// ============================================================================

/// Minimal element tree for SQS response documents
#[derive(Debug, Default)]
struct XmlElement {
    name: String,
    text: String,
    children: Vec<XmlElement>,
}

impl XmlElement {
    fn parse(xml: &str) -> Result<Self, SerializationError> {
        use quick_xml::events::Event;
        use quick_xml::Reader;

        // Text is kept verbatim; message bodies may carry meaningful whitespace
        let mut reader = Reader::from_str(xml);

        let mut stack = vec![XmlElement {
            name: "#document".to_string(),
            ..Default::default()
        }];
        let mut buf = Vec::new();

        loop {
            match reader.read_event_into(&mut buf) {
                Ok(Event::Start(e)) => stack.push(XmlElement {
                    name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                    ..Default::default()
                }),
                Ok(Event::Empty(e)) => {
                    let element = XmlElement {
                        name: String::from_utf8_lossy(e.local_name().as_ref()).into_owned(),
                        ..Default::default()
                    };
                    if let Some(parent) = stack.last_mut() {
                        parent.children.push(element);
                    }
                }
                Ok(Event::End(_)) => {
                    let element = stack.pop().ok_or_else(|| SerializationError::Xml {
                        message: "unbalanced end tag".to_string(),
                    })?;
                    match stack.last_mut() {
                        Some(parent) => parent.children.push(element),
                        None => {
                            return Err(SerializationError::Xml {
                                message: "unbalanced end tag".to_string(),
                            })
                        }
                    }
                }
                Ok(Event::Text(e)) => {
                    let text = e.unescape().map_err(|e| SerializationError::Xml {
                        message: e.to_string(),
                    })?;
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::CData(e)) => {
                    let text = String::from_utf8_lossy(&e.into_inner()).into_owned();
                    if let Some(current) = stack.last_mut() {
                        current.text.push_str(&text);
                    }
                }
                Ok(Event::Eof) => break,
                Err(e) => {
                    return Err(SerializationError::Xml {
                        message: format!("position {}: {}", reader.buffer_position(), e),
                    })
                }
                _ => {}
            }
            buf.clear();
        }

        if stack.len() != 1 {
            return Err(SerializationError::Xml {
                message: "document ended inside an element".to_string(),
            });
        }

        stack.pop().ok_or_else(|| SerializationError::Xml {
            message: "empty document".to_string(),
        })
    }

    fn child(&self, name: &str) -> Option<&XmlElement> {
        self.children.iter().find(|c| c.name == name)
    }

    fn children_named<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a XmlElement> {
        self.children.iter().filter(move |c| c.name == name)
    }

    fn child_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.trim())
    }

    /// Untrimmed text, for message content
    fn child_raw_text(&self, name: &str) -> Option<&str> {
        self.child(name).map(|c| c.text.as_str())
    }

    /// First descendant with the given name, depth first
    fn find(&self, name: &str) -> Option<&XmlElement> {
        self.children
            .iter()
            .find_map(|c| if c.name == name { Some(c) } else { c.find(name) })
    }

    fn require_text(&self, name: &str) -> Result<&str, SerializationError> {
        self.find(name)
            .map(|e| e.text.trim())
            .ok_or_else(|| SerializationError::MissingElement {
                element: name.to_string(),
            })
    }
}

/// Parse `<Attribute><Name/><Value/></Attribute>` pairs below `parent`
fn parse_attribute_pairs(parent: &XmlElement) -> Vec<(String, String)> {
    parent
        .children_named("Attribute")
        .filter_map(|a| Some((a.child_text("Name")?.to_string(), a.child_text("Value")?.to_string())))
        .collect()
}

fn parse_queue_url_response(xml: &str) -> Result<QueueUrl, SerializationError> {
    let document = XmlElement::parse(xml)?;
    document.require_text("QueueUrl").map(QueueUrl::new)
}

fn parse_send_message_response(xml: &str) -> Result<SendReceipt, SerializationError> {
    let document = XmlElement::parse(xml)?;
    let message_id = document.require_text("MessageId")?;
    let body_md5 = document.require_text("MD5OfMessageBody")?;

    Ok(SendReceipt {
        message_id: message_id
            .parse()
            .map_err(|_| SerializationError::MissingElement {
                element: "MessageId".to_string(),
            })?,
        body_md5: body_md5.to_string(),
        sequence_number: document
            .find("SequenceNumber")
            .map(|e| e.text.trim().to_string()),
    })
}

fn parse_receive_message_response(xml: &str) -> Result<Vec<ReceivedMessage>, SerializationError> {
    let document = XmlElement::parse(xml)?;
    let Some(result) = document.find("ReceiveMessageResult") else {
        return Ok(Vec::new());
    };

    let mut messages = Vec::new();
    for element in result.children_named("Message") {
        let message_id: MessageId = element
            .child_text("MessageId")
            .unwrap_or_default()
            .parse()
            .map_err(|_| SerializationError::MissingElement {
                element: "MessageId".to_string(),
            })?;
        let receipt = element.child_text("ReceiptHandle").ok_or_else(|| {
            SerializationError::MissingElement {
                element: "ReceiptHandle".to_string(),
            }
        })?;
        let body = element.child_raw_text("Body").unwrap_or_default().to_string();

        let system: HashMap<String, String> = parse_attribute_pairs(element).into_iter().collect();
        let receive_count = system
            .get("ApproximateReceiveCount")
            .and_then(|count| count.parse().ok())
            .unwrap_or(1);
        let sent_at = system
            .get("SentTimestamp")
            .and_then(|millis| millis.parse().ok())
            .and_then(Timestamp::from_millis)
            .unwrap_or_else(Timestamp::now);

        let attributes = element
            .children_named("MessageAttribute")
            .filter_map(|attribute| {
                let name = attribute.child_text("Name")?;
                let value = attribute.child("Value")?.child_raw_text("StringValue")?;
                Some((name.to_string(), value.to_string()))
            })
            .collect();

        messages.push(ReceivedMessage {
            message_id,
            body,
            attributes,
            receipt_handle: ReceiptHandle::new(receipt),
            message_group_id: system.get("MessageGroupId").cloned(),
            receive_count,
            sent_at,
            delivered_at: Timestamp::now(),
        });
    }

    Ok(messages)
}

fn parse_get_queue_attributes_response(xml: &str) -> Result<QueueAttributes, SerializationError> {
    let document = XmlElement::parse(xml)?;
    let Some(result) = document.find("GetQueueAttributesResult") else {
        return Err(SerializationError::MissingElement {
            element: "GetQueueAttributesResult".to_string(),
        });
    };

    // Attributes this runtime does not model are skipped
    Ok(parse_attribute_pairs(result)
        .into_iter()
        .filter_map(|(name, value)| Some((name.parse::<QueueAttribute>().ok()?, value)))
        .collect())
}

/// Map an SQS error document and HTTP status to the queue error taxonomy
fn parse_error_response(xml: &str, status_code: u16) -> QueueError {
    let document = XmlElement::parse(xml).ok();
    let error = document.as_ref().and_then(|d| d.find("Error"));

    let code = error
        .and_then(|e| e.child_text("Code"))
        .unwrap_or("Unknown")
        .to_string();
    let message = error
        .and_then(|e| e.child_text("Message"))
        .unwrap_or("Unknown error")
        .to_string();

    match code.as_str() {
        "AWS.SimpleQueueService.NonExistentQueue" | "QueueDoesNotExist" => {
            QueueError::QueueNotFound {
                queue_name: message,
            }
        }
        "QueueAlreadyExists" | "QueueNameExists" => QueueError::QueueAlreadyExists {
            queue_name: message,
        },
        "ReceiptHandleIsInvalid"
        | "InvalidReceiptHandle"
        | "AWS.SimpleQueueService.MessageNotInflight"
        | "MessageNotInflight" => QueueError::MessageNotFound { receipt: message },
        "AccessDenied" | "AccessDeniedException" => QueueError::PermissionDenied {
            operation: message,
        },
        "InvalidClientTokenId"
        | "UnrecognizedClientException"
        | "SignatureDoesNotMatch"
        | "MissingAuthenticationToken"
        | "ExpiredToken" => QueueError::AuthenticationFailed {
            message: format!("{}: {}", code, message),
        },
        _ if status_code == 401 || status_code == 403 => QueueError::AuthenticationFailed {
            message: format!("{}: {}", code, message),
        },
        _ if status_code >= 500 => QueueError::ProviderError {
            provider: PROVIDER_NAME.to_string(),
            code,
            message,
        },
        _ => QueueError::InvalidRequest {
            provider: PROVIDER_NAME.to_string(),
            code,
            message,
        },
    }
}

/// Add `Attribute.N.Name` / `Attribute.N.Value` parameters
fn insert_attribute_params(params: &mut BTreeMap<String, String>, attributes: &QueueAttributes) {
    for (index, (attribute, value)) in attributes.iter().enumerate() {
        let n = index + 1;
        params.insert(format!("Attribute.{}.Name", n), attribute.as_str().to_string());
        params.insert(format!("Attribute.{}.Value", n), value.clone());
    }
}

// ============================================================================
// AWS SQS Provider
// ============================================================================

/// AWS SQS queue provider implementation
///
/// The provider is thread-safe and can be shared across async tasks. The
/// queue URL cache is protected by an async `RwLock`.
pub struct AwsSqsProvider {
    http_client: HttpClient,
    signer: Option<AwsV4Signer>,
    config: AwsSqsConfig,
    endpoint: url::Url,
    queue_url_cache: Arc<RwLock<HashMap<QueueName, QueueUrl>>>,
}

impl AwsSqsProvider {
    /// Create new AWS SQS provider
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the region is empty or the endpoint is
    /// not a URL, and a connection error if the HTTP client cannot be built.
    pub fn new(config: AwsSqsConfig, request_timeout_seconds: u64) -> Result<Self, QueueError> {
        config.validate()?;

        let signer = AwsCredentials::resolve(&config)
            .map(|credentials| AwsV4Signer::new(credentials, config.region.clone()));

        let endpoint_text = config
            .endpoint
            .clone()
            .unwrap_or_else(|| format!("https://sqs.{}.amazonaws.com", config.region));
        let endpoint = url::Url::parse(&endpoint_text).map_err(|e| {
            QueueError::ConfigurationError(ConfigurationError::Invalid {
                message: format!("invalid SQS endpoint '{}': {}", endpoint_text, e),
            })
        })?;

        // Long polls hold the connection open for up to the maximum wait
        let timeout =
            Duration::from_secs(request_timeout_seconds + u64::from(MAX_WAIT_TIME_SECONDS));
        let http_client = HttpClient::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("Failed to create HTTP client: {}", e),
            })?;

        Ok(Self {
            http_client,
            signer,
            config,
            endpoint,
            queue_url_cache: Arc::new(RwLock::new(HashMap::new())),
        })
    }

    fn host_header(&self) -> String {
        let host = self.endpoint.host_str().unwrap_or_default();
        match self.endpoint.port() {
            Some(port) => format!("{}:{}", host, port),
            None => host.to_string(),
        }
    }

    /// Send a signed Query API action and return the response body
    async fn make_request(
        &self,
        action: &str,
        mut params: BTreeMap<String, String>,
    ) -> Result<String, QueueError> {
        let signer = self
            .signer
            .as_ref()
            .ok_or_else(|| QueueError::AuthenticationFailed {
                message: "No AWS credentials configured".to_string(),
            })?;

        params.insert("Action".to_string(), action.to_string());
        params.insert("Version".to_string(), API_VERSION.to_string());

        let path = self.endpoint.path().to_string();
        let path = if path.is_empty() { "/".to_string() } else { path };
        let host = self.host_header();
        let headers = signer.sign_request("POST", &host, &path, &params, "", &Utc::now())?;

        let mut url = self.endpoint.clone();
        url.set_query(Some(&canonical_query(&params)));

        let mut request = self.http_client.post(url);
        for (key, value) in headers {
            request = request.header(key, value);
        }

        debug!(action, endpoint = %self.endpoint, "Sending SQS request");

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                QueueError::Timeout {
                    duration: Duration::from_secs(u64::from(MAX_WAIT_TIME_SECONDS)),
                }
            } else {
                QueueError::ConnectionFailed {
                    message: format!("{} request failed: {}", action, e),
                }
            }
        })?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| QueueError::ConnectionFailed {
                message: format!("Failed to read response body: {}", e),
            })?;

        if !status.is_success() {
            return Err(parse_error_response(&body, status.as_u16()));
        }

        Ok(body)
    }
}

impl fmt::Debug for AwsSqsProvider {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("AwsSqsProvider")
            .field("region", &self.config.region)
            .field("endpoint", &self.endpoint.as_str())
            .field("credentials", &self.signer.as_ref().map(|_| "<redacted>"))
            .finish()
    }
}

#[async_trait]
impl QueueProvider for AwsSqsProvider {
    async fn create_queue(
        &self,
        queue: &QueueName,
        attributes: &QueueAttributes,
    ) -> Result<QueueUrl, QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueName".to_string(), queue.as_str().to_string());

        let mut attributes = attributes.clone();
        if queue.is_fifo() {
            attributes
                .entry(QueueAttribute::FifoQueue)
                .or_insert_with(|| "true".to_string());
        }
        insert_attribute_params(&mut params, &attributes);

        let response = self.make_request("CreateQueue", params).await?;
        let url = parse_queue_url_response(&response)?;

        self.queue_url_cache
            .write()
            .await
            .insert(queue.clone(), url.clone());

        Ok(url)
    }

    async fn get_queue_url(&self, queue: &QueueName) -> Result<QueueUrl, QueueError> {
        {
            let cache = self.queue_url_cache.read().await;
            if let Some(url) = cache.get(queue) {
                return Ok(url.clone());
            }
        }

        let mut params = BTreeMap::new();
        params.insert("QueueName".to_string(), queue.as_str().to_string());

        let response = self.make_request("GetQueueUrl", params).await?;
        let url = parse_queue_url_response(&response)?;

        self.queue_url_cache
            .write()
            .await
            .insert(queue.clone(), url.clone());

        Ok(url)
    }

    async fn send_message(
        &self,
        queue: &QueueUrl,
        message: &Message,
        options: &SendOptions,
    ) -> Result<SendReceipt, QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), queue.as_str().to_string());
        params.insert("MessageBody".to_string(), message.body.clone());

        if options.delay_seconds > 0 {
            params.insert("DelaySeconds".to_string(), options.delay_seconds.to_string());
        }
        if let Some(group) = &options.message_group_id {
            params.insert("MessageGroupId".to_string(), group.clone());
        }
        if let Some(dedup) = &options.deduplication_id {
            params.insert("MessageDeduplicationId".to_string(), dedup.clone());
        }

        // Sorted so the parameter indexes are stable
        let sorted: BTreeMap<&String, &String> = message.attributes.iter().collect();
        for (index, (name, value)) in sorted.into_iter().enumerate() {
            let n = index + 1;
            params.insert(format!("MessageAttribute.{}.Name", n), name.clone());
            params.insert(
                format!("MessageAttribute.{}.Value.DataType", n),
                "String".to_string(),
            );
            params.insert(
                format!("MessageAttribute.{}.Value.StringValue", n),
                value.clone(),
            );
        }

        let response = self.make_request("SendMessage", params).await?;
        Ok(parse_send_message_response(&response)?)
    }

    async fn receive_messages(
        &self,
        queue: &QueueUrl,
        options: &ReceiveOptions,
    ) -> Result<Vec<ReceivedMessage>, QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), queue.as_str().to_string());
        params.insert(
            "MaxNumberOfMessages".to_string(),
            options.max_messages.to_string(),
        );
        if let Some(wait) = options.wait_time_seconds {
            params.insert("WaitTimeSeconds".to_string(), wait.to_string());
        }
        if let Some(visibility) = options.visibility_timeout_seconds {
            params.insert("VisibilityTimeout".to_string(), visibility.to_string());
        }
        params.insert("AttributeName.1".to_string(), "All".to_string());
        params.insert("MessageAttributeName.1".to_string(), "All".to_string());

        let response = self.make_request("ReceiveMessage", params).await?;
        Ok(parse_receive_message_response(&response)?)
    }

    async fn delete_message(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
    ) -> Result<(), QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), queue.as_str().to_string());
        params.insert("ReceiptHandle".to_string(), receipt.as_str().to_string());

        self.make_request("DeleteMessage", params).await?;
        Ok(())
    }

    async fn change_message_visibility(
        &self,
        queue: &QueueUrl,
        receipt: &ReceiptHandle,
        visibility_timeout_seconds: u32,
    ) -> Result<(), QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), queue.as_str().to_string());
        params.insert("ReceiptHandle".to_string(), receipt.as_str().to_string());
        params.insert(
            "VisibilityTimeout".to_string(),
            visibility_timeout_seconds.to_string(),
        );

        self.make_request("ChangeMessageVisibility", params).await?;
        Ok(())
    }

    async fn get_queue_attributes(
        &self,
        queue: &QueueUrl,
        attributes: &[QueueAttribute],
    ) -> Result<QueueAttributes, QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), queue.as_str().to_string());
        if attributes.is_empty() {
            params.insert("AttributeName.1".to_string(), "All".to_string());
        } else {
            for (index, attribute) in attributes.iter().enumerate() {
                params.insert(
                    format!("AttributeName.{}", index + 1),
                    attribute.as_str().to_string(),
                );
            }
        }

        let response = self.make_request("GetQueueAttributes", params).await?;
        Ok(parse_get_queue_attributes_response(&response)?)
    }

    async fn set_queue_attributes(
        &self,
        queue: &QueueUrl,
        attributes: &QueueAttributes,
    ) -> Result<(), QueueError> {
        let mut params = BTreeMap::new();
        params.insert("QueueUrl".to_string(), queue.as_str().to_string());
        insert_attribute_params(&mut params, attributes);

        self.make_request("SetQueueAttributes", params).await?;
        Ok(())
    }

    fn provider_type(&self) -> ProviderType {
        ProviderType::AwsSqs
    }
}
