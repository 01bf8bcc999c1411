//! End-to-end tests for both panel pipelines against in-memory collaborators.
//!
//! A raw message goes through the mail host, the signature extractor and the
//! reconciler; its attachments go through the tree builder and the scorer.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::time::timeout;

use mail_sidepanel::config::PanelPolicy;
use mail_sidepanel::contacts::{
    ContactRecord, MutationOutcome, Reconciler, ReconciliationState, extract_contact,
};
use mail_sidepanel::error::{ReconcileError, TransportError};
use mail_sidepanel::folders::{Attachment, Suggestion, Target, TreeBuilder};
use mail_sidepanel::services::{
    MailItem, MemoryDirectory, MemoryNamespace, NamespaceEntry, NamespaceService,
};

/// Maximum time any test is allowed to run before we consider it hung.
const TEST_TIMEOUT: Duration = Duration::from_secs(5);

const POLICY: &str = r#"{
    "expansion": [
        { "match": { "kind": "ignore_case", "value": "clients" }, "depth": 2 },
        { "match": { "kind": "exact", "value": "Projects" }, "depth": 1, "anchor": "Active" }
    ],
    "scopes": [
        { "scope": ["Clients"], "strategy": "longest_substring" },
        { "scope": ["Projects"], "strategy": "token_overlap" }
    ],
    "fallback": ["Inbox"]
}"#;

const RAW: &str = concat!(
    "From: John Smith <john@example.com>\r\n",
    "To: desk@acme.com\r\n",
    "Subject: Offer\r\n",
    "MIME-Version: 1.0\r\n",
    "Content-Type: multipart/mixed; boundary=\"XX\"\r\n",
    "\r\n",
    "--XX\r\n",
    "Content-Type: text/plain; charset=utf-8\r\n",
    "\r\n",
    "Hi,\r\n",
    "\r\n",
    "John Smith\r\n",
    "Sales Director\r\n",
    "+31 6 1234 5678\r\n",
    "1234 AB Amsterdam\r\n",
    "john@example.com\r\n",
    "--XX\r\n",
    "Content-Type: application/pdf\r\n",
    "Content-Disposition: attachment; filename=\"Acme offer.pdf\"\r\n",
    "\r\n",
    "PDF\r\n",
    "--XX\r\n",
    "Content-Type: image/png\r\n",
    "Content-Disposition: attachment; filename=\"image001.png\"\r\n",
    "\r\n",
    "PNG\r\n",
    "--XX--\r\n",
);

fn namespace() -> MemoryNamespace {
    MemoryNamespace::new("root")
        .with_folder("root", "c", "Clients")
        .with_folder("c", "c-acme", "Acme")
        .with_folder("c-acme", "c-acme-24", "2024")
        .with_folder("c", "c-globex", "Globex")
        .with_folder("root", "p", "Projects")
        .with_folder("p", "p-active", "Active")
        .with_folder("p-active", "p-apollo", "Apollo Launch")
        .with_folder("root", "i", "Inbox")
}

/// Namespace wrapper that records how many listings overlap.
struct CountingNamespace {
    inner: MemoryNamespace,
    in_flight: AtomicUsize,
    peak: AtomicUsize,
}

#[async_trait]
impl NamespaceService for CountingNamespace {
    async fn list_children(
        &self,
        container_id: &str,
    ) -> Result<Vec<NamespaceEntry>, TransportError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(10)).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        self.inner.list_children(container_id).await
    }
}

async fn forest_for(policy: &PanelPolicy) -> Vec<mail_sidepanel::folders::FolderNode> {
    TreeBuilder::new(Arc::new(namespace()), policy.expansion_policy().unwrap())
        .build("root")
        .await
        .unwrap()
}

#[tokio::test]
async fn attachment_is_placed_under_matching_client() {
    timeout(TEST_TIMEOUT, async {
        let policy = PanelPolicy::from_json(POLICY).unwrap();
        let forest = forest_for(&policy).await;
        let item = MailItem::parse(RAW.as_bytes()).unwrap();

        let selected = Attachment::default_selection(&item.attachments);
        assert_eq!(selected.len(), 1, "inline image is deselected");

        let subject = Some(item.subject.as_str());
        let targets = Target::for_selection(&item.attachments, &selected, subject);
        let suggestion = policy.scope_chain().suggest(&forest, &targets);

        match suggestion {
            Suggestion::Match(candidate) => {
                // "Acme" and "Acme/2024" tie on score; the shallower one wins.
                assert_eq!(candidate.node.path, "Clients/Acme");
                assert_eq!(candidate.score, 4.0);
            }
            other => panic!("Expected a match, got {other:?}"),
        }
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn second_tier_and_fallback() {
    timeout(TEST_TIMEOUT, async {
        let policy = PanelPolicy::from_json(POLICY).unwrap();
        let forest = forest_for(&policy).await;
        let chain = policy.scope_chain();

        let launch = Attachment {
            id: "a1".into(),
            name: "launch plan.docx".into(),
            size: 10,
        };
        let targets = Target::for_selection(&[launch], &["a1".to_string()], None);
        let suggestion = chain.suggest(&forest, &targets);
        assert_eq!(
            suggestion.node().map(|n| n.path.as_str()),
            Some("Projects/Active/Apollo Launch")
        );

        let unrelated = Attachment {
            id: "a2".into(),
            name: "invoice.pdf".into(),
            size: 10,
        };
        let targets = Target::for_selection(&[unrelated], &["a2".to_string()], None);
        let suggestion = chain.suggest(&forest, &targets);
        assert!(matches!(suggestion, Suggestion::Fallback(node) if node.path == "Inbox"));
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn listing_concurrency_respects_bound() {
    timeout(TEST_TIMEOUT, async {
        let policy = PanelPolicy::from_json(POLICY).unwrap();
        let counting = Arc::new(CountingNamespace {
            inner: namespace(),
            in_flight: AtomicUsize::new(0),
            peak: AtomicUsize::new(0),
        });

        let forest = TreeBuilder::new(counting.clone(), policy.expansion_policy().unwrap())
            .with_max_in_flight(1)
            .build("root")
            .await
            .unwrap();

        assert_eq!(forest, forest_for(&policy).await);
        assert_eq!(counting.peak.load(Ordering::SeqCst), 1);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn signature_contact_updates_changed_entry() {
    timeout(TEST_TIMEOUT, async {
        let item = MailItem::parse(RAW.as_bytes()).unwrap();
        let contact = extract_contact(&item.body, &item.sender_name, &item.sender_email);
        assert_eq!(contact.name, "John Smith");
        assert_eq!(contact.phone, "+31 6 1234 5678");
        assert_eq!(contact.postcode, "1234 AB");
        assert_eq!(contact.organization, "Example");

        let directory = Arc::new(MemoryDirectory::new());
        let id = directory.insert(ContactRecord {
            phone: "020 000 0000".into(),
            ..contact.clone()
        });

        let reconciler = Reconciler::new(directory.clone());
        let mut cycle = reconciler.check(contact.clone()).await.unwrap();
        assert_eq!(cycle.state(), ReconciliationState::Changed);

        let outcome = reconciler.confirm(&mut cycle).await.unwrap();
        assert_eq!(outcome, MutationOutcome::Updated { id: id.clone() });
        assert_eq!(directory.get(&id).unwrap(), contact);

        let again = reconciler.check(contact).await.unwrap();
        assert_eq!(again.state(), ReconciliationState::Unchanged);
    })
    .await
    .expect("test timed out");
}

#[tokio::test]
async fn deleted_entry_surfaces_stale_reference() {
    timeout(TEST_TIMEOUT, async {
        let directory = Arc::new(MemoryDirectory::new());
        let record = ContactRecord {
            name: "Ann Lee".into(),
            email: "ann@acme.com".into(),
            phone: "123".into(),
            organization: "Acme".into(),
            postcode: String::new(),
        };
        let id = directory.insert(ContactRecord {
            phone: "456".into(),
            ..record.clone()
        });

        let reconciler = Reconciler::new(directory.clone());
        let mut cycle = reconciler.check(record).await.unwrap();
        directory.remove(&id);

        let err = reconciler.confirm(&mut cycle).await.unwrap_err();
        assert!(matches!(err, ReconcileError::StaleReference { .. }));
        assert_eq!(cycle.state(), ReconciliationState::Idle);
        assert!(directory.is_empty(), "stale update must not create");
    })
    .await
    .expect("test timed out");
}
