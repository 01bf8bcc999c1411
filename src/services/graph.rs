//! Microsoft Graph collaborator.
//!
//! Speaks the drive-items and personal-contacts endpoints over HTTPS with a
//! bearer token. Responses are parsed into typed wire structs at this
//! boundary; anything that does not fit is [`TransportError::Malformed`].

use async_trait::async_trait;
use reqwest::{Method, StatusCode};
use secrecy::{ExposeSecret, SecretString};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::contacts::model::{ContactRecord, ExistingDirectoryEntry};
use crate::error::TransportError;
use crate::services::{DirectoryFilter, DirectoryService, NamespaceEntry, NamespaceService};

pub const DEFAULT_BASE_URL: &str = "https://graph.microsoft.com/v1.0";

const SERVICE: &str = "graph";

/// Upper bound on `@odata.nextLink` pages followed for one listing.
const MAX_LISTING_PAGES: usize = 100;

/// Graph client implementing both the namespace and the directory boundary.
pub struct GraphClient {
    client: reqwest::Client,
    base_url: String,
    token: SecretString,
    drive_id: Option<String>,
}

impl GraphClient {
    pub fn new(base_url: impl Into<String>, token: SecretString) -> Self {
        Self {
            client: reqwest::Client::new(),
            base_url: base_url.into().trim_end_matches('/').to_string(),
            token,
            drive_id: None,
        }
    }

    /// List items of this drive instead of the signed-in user's OneDrive.
    pub fn with_drive(mut self, drive_id: impl Into<String>) -> Self {
        self.drive_id = Some(drive_id.into());
        self
    }

    pub fn drive_id(&self) -> Option<&str> {
        self.drive_id.as_deref()
    }

    /// Resolve a SharePoint site path (`host:/sites/Name`) to its default
    /// document library's drive id.
    pub async fn resolve_drive(&self, site_path: &str) -> Result<String, TransportError> {
        let site: IdOnly = self
            .get_json(&format!("{}/sites/{}", self.base_url, site_path), site_path)
            .await?;
        let drive: IdOnly = self
            .get_json(&format!("{}/sites/{}/drive", self.base_url, site.id), &site.id)
            .await?;
        debug!(site = %site_path, drive = %drive.id, "Resolved site drive");
        Ok(drive.id)
    }

    fn children_url(&self, container_id: &str) -> String {
        match &self.drive_id {
            Some(drive) => format!(
                "{}/drives/{}/items/{}/children",
                self.base_url, drive, container_id
            ),
            None => format!(
                "{}/me/drive/items/{}/children",
                self.base_url, container_id
            ),
        }
    }

    fn contacts_url(&self) -> String {
        format!("{}/me/contacts", self.base_url)
    }

    /// Accept a `@odata.nextLink` only if it lies under `base_url`.
    fn next_page_url(&self, link: String) -> Result<String, TransportError> {
        let under_base = link
            .strip_prefix(self.base_url.as_str())
            .is_some_and(|rest| rest.starts_with('/'));
        if under_base {
            Ok(link)
        } else {
            Err(TransportError::Malformed {
                service: SERVICE.to_string(),
                reason: format!("nextLink outside {}: {link}", self.base_url),
            })
        }
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        id: &str,
    ) -> Result<T, TransportError> {
        let resp = self
            .client
            .get(url)
            .bearer_auth(self.token.expose_secret())
            .send()
            .await
            .map_err(request_failed)?;
        read_json(resp, id).await
    }
}

fn request_failed(e: reqwest::Error) -> TransportError {
    TransportError::Request {
        service: SERVICE.to_string(),
        reason: e.to_string(),
    }
}

/// Check the status and decode the body. A 404 becomes `NotFound { id }`.
async fn read_json<T: DeserializeOwned>(
    resp: reqwest::Response,
    id: &str,
) -> Result<T, TransportError> {
    check_status(&resp, id)?;
    resp.json::<T>().await.map_err(|e| TransportError::Malformed {
        service: SERVICE.to_string(),
        reason: e.to_string(),
    })
}

fn check_status(resp: &reqwest::Response, id: &str) -> Result<(), TransportError> {
    let status = resp.status();
    if status == StatusCode::NOT_FOUND {
        return Err(TransportError::NotFound {
            service: SERVICE.to_string(),
            id: id.to_string(),
        });
    }
    if !status.is_success() {
        return Err(TransportError::Status {
            service: SERVICE.to_string(),
            status: status.as_u16(),
            context: resp.url().path().to_string(),
        });
    }
    Ok(())
}

#[async_trait]
impl NamespaceService for GraphClient {
    async fn list_children(
        &self,
        container_id: &str,
    ) -> Result<Vec<NamespaceEntry>, TransportError> {
        let mut entries = Vec::new();
        let mut url = self.children_url(container_id);

        for _ in 0..MAX_LISTING_PAGES {
            let page: Page<DriveItem> = self.get_json(&url, container_id).await?;
            entries.extend(page.value.into_iter().map(NamespaceEntry::from));
            let Some(next) = page.next_link else {
                debug!(container = %container_id, count = entries.len(), "Listed drive children");
                return Ok(entries);
            };
            url = self.next_page_url(next)?;
        }

        Err(TransportError::Malformed {
            service: SERVICE.to_string(),
            reason: format!("listing {container_id} exceeded {MAX_LISTING_PAGES} pages"),
        })
    }
}

#[async_trait]
impl DirectoryService for GraphClient {
    async fn find(
        &self,
        filter: &DirectoryFilter,
    ) -> Result<Option<ExistingDirectoryEntry>, TransportError> {
        let resp = self
            .client
            .get(self.contacts_url())
            .bearer_auth(self.token.expose_secret())
            .query(&[("$filter", filter.to_odata()), ("$top", "1".to_string())])
            .send()
            .await
            .map_err(request_failed)?;

        let page: Page<GraphContact> = read_json(resp, "contacts").await?;
        Ok(page.value.into_iter().next().map(ExistingDirectoryEntry::from))
    }

    async fn create(&self, record: &ContactRecord) -> Result<String, TransportError> {
        let created: IdOnly = self
            .send_contact(Method::POST, self.contacts_url(), "contacts", record)
            .await?;
        Ok(created.id)
    }

    async fn update(&self, id: &str, record: &ContactRecord) -> Result<(), TransportError> {
        let url = format!("{}/{}", self.contacts_url(), id);
        let _: IdOnly = self.send_contact(Method::PATCH, url, id, record).await?;
        Ok(())
    }
}

impl GraphClient {
    async fn send_contact(
        &self,
        method: Method,
        url: String,
        id: &str,
        record: &ContactRecord,
    ) -> Result<IdOnly, TransportError> {
        let resp = self
            .client
            .request(method, url)
            .bearer_auth(self.token.expose_secret())
            .json(&ContactPayload::from(record))
            .send()
            .await
            .map_err(request_failed)?;
        read_json(resp, id).await
    }
}

// ── Wire types ──────────────────────────────────────────────────────

#[derive(Debug, Deserialize)]
struct Page<T> {
    value: Vec<T>,
    #[serde(rename = "@odata.nextLink")]
    next_link: Option<String>,
}

#[derive(Debug, Deserialize)]
struct IdOnly {
    id: String,
}

#[derive(Debug, Deserialize)]
struct DriveItem {
    id: String,
    name: String,
    /// Present (as an object) only on containers.
    folder: Option<serde_json::Value>,
}

impl From<DriveItem> for NamespaceEntry {
    fn from(item: DriveItem) -> Self {
        Self {
            id: item.id,
            name: item.name,
            is_container: item.folder.is_some(),
        }
    }
}

#[derive(Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
struct EmailAddress {
    address: String,
    #[serde(default)]
    name: String,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct GraphContact {
    id: String,
    #[serde(default)]
    email_addresses: Vec<EmailAddress>,
    #[serde(default)]
    business_phones: Vec<String>,
    #[serde(default)]
    company_name: Option<String>,
}

impl From<GraphContact> for ExistingDirectoryEntry {
    fn from(contact: GraphContact) -> Self {
        Self {
            id: contact.id,
            email: contact
                .email_addresses
                .into_iter()
                .next()
                .map(|e| e.address)
                .unwrap_or_default(),
            phone: contact.business_phones.into_iter().next().unwrap_or_default(),
            organization: contact.company_name.unwrap_or_default(),
        }
    }
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct PostalAddress {
    postal_code: String,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct ContactPayload {
    given_name: String,
    email_addresses: Vec<EmailAddress>,
    business_phones: Vec<String>,
    company_name: String,
    home_address: PostalAddress,
}

impl From<&ContactRecord> for ContactPayload {
    fn from(record: &ContactRecord) -> Self {
        let business_phones = if record.phone.is_empty() {
            Vec::new()
        } else {
            vec![record.phone.clone()]
        };
        Self {
            given_name: record.name.clone(),
            email_addresses: vec![EmailAddress {
                address: record.email.clone(),
                name: record.name.clone(),
            }],
            business_phones,
            company_name: record.organization.clone(),
            home_address: PostalAddress {
                postal_code: record.postcode.clone(),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn client() -> GraphClient {
        GraphClient::new("https://graph.example/v1.0/", SecretString::from("token"))
    }

    #[test]
    fn children_url_uses_drive_when_set() {
        assert_eq!(
            client().children_url("root"),
            "https://graph.example/v1.0/me/drive/items/root/children"
        );
        assert_eq!(
            client().with_drive("d1").children_url("abc"),
            "https://graph.example/v1.0/drives/d1/items/abc/children"
        );
    }

    #[test]
    fn next_link_must_stay_under_base_url() {
        let graph = client();
        let link = "https://graph.example/v1.0/me/drive/items/root/children?$skiptoken=2";
        assert_eq!(graph.next_page_url(link.to_string()).unwrap(), link);

        for foreign in [
            "https://attacker.example/v1.0/me/drive/items/root/children",
            "https://graph.example/v1.0evil/items",
            "/me/drive/items/root/children",
        ] {
            assert!(matches!(
                graph.next_page_url(foreign.to_string()),
                Err(TransportError::Malformed { .. })
            ));
        }
    }

    #[test]
    fn drive_items_map_folder_facet_to_container() {
        let page: Page<DriveItem> = serde_json::from_value(serde_json::json!({
            "value": [
                { "id": "1", "name": "Clients", "folder": { "childCount": 3 } },
                { "id": "2", "name": "notes.docx", "file": { "mimeType": "x" } }
            ],
            "@odata.nextLink": "https://graph.example/next"
        }))
        .unwrap();

        assert_eq!(page.next_link.as_deref(), Some("https://graph.example/next"));
        let entries: Vec<NamespaceEntry> =
            page.value.into_iter().map(NamespaceEntry::from).collect();
        assert_eq!(
            entries,
            vec![
                NamespaceEntry::folder("1", "Clients"),
                NamespaceEntry::file("2", "notes.docx"),
            ]
        );
    }

    #[test]
    fn item_without_id_is_rejected() {
        let result: Result<Page<DriveItem>, _> =
            serde_json::from_value(serde_json::json!({ "value": [{ "name": "x" }] }));
        assert!(result.is_err());
    }

    #[test]
    fn contact_reads_first_address_and_phone() {
        let contact: GraphContact = serde_json::from_value(serde_json::json!({
            "id": "c1",
            "emailAddresses": [{ "address": "a@x.com", "name": "Ann" }, { "address": "b@x.com" }],
            "businessPhones": ["123", "456"],
            "companyName": "Acme"
        }))
        .unwrap();
        let entry = ExistingDirectoryEntry::from(contact);
        assert_eq!(entry.email, "a@x.com");
        assert_eq!(entry.phone, "123");
        assert_eq!(entry.organization, "Acme");
    }

    #[test]
    fn contact_missing_fields_become_empty() {
        let contact: GraphContact =
            serde_json::from_value(serde_json::json!({ "id": "c1", "companyName": null })).unwrap();
        let entry = ExistingDirectoryEntry::from(contact);
        assert_eq!(entry.email, "");
        assert_eq!(entry.phone, "");
        assert_eq!(entry.organization, "");
    }

    #[test]
    fn payload_shape() {
        let record = ContactRecord {
            name: "John Smith".into(),
            email: "john@example.com".into(),
            phone: "+31 6 1234 5678".into(),
            organization: "Example".into(),
            postcode: "1234 AB".into(),
        };
        let value = serde_json::to_value(ContactPayload::from(&record)).unwrap();
        assert_eq!(
            value,
            serde_json::json!({
                "givenName": "John Smith",
                "emailAddresses": [{ "address": "john@example.com", "name": "John Smith" }],
                "businessPhones": ["+31 6 1234 5678"],
                "companyName": "Example",
                "homeAddress": { "postalCode": "1234 AB" }
            })
        );
    }

    #[test]
    fn payload_omits_empty_phone() {
        let value = serde_json::to_value(ContactPayload::from(&ContactRecord::default())).unwrap();
        assert_eq!(value["businessPhones"], serde_json::json!([]));
    }
}
