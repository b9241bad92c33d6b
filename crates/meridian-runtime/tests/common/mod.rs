//! Shared fixtures for lifecycle tests.

#![allow(dead_code)]

use async_trait::async_trait;
use meridian_core::{CredentialsConfig, InstanceRecord, OrgCredentials, ProvisionDetails};
use meridian_plans::{PlanResolver, PlanTemplate, TemplateRegistry, injected_values, plan_id_for};
use meridian_runtime::{InMemoryClusterApi, Orchestrator};
use meridian_store::{InstanceStore, MemoryInstanceStore, StoreError};
use serde_json::Value;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub const DASHBOARD: &str = "https://cloud.example.com";

pub const BASIC: &str = r#"name: basic
description: Basic test cluster
project:
  id: "{{ project_id | default('') }}"
  name: "{{ project_name | default(instance_id) }}"
  orgId: "{{ org_id | default('org-a') }}"
cluster:
  providerSettings:
    providerName: AWS
    regionName: US_EAST_1
    instanceSizeName: "{{ size | default('M10') }}"
databaseUsers:
  - username: app
    password: "{{ password | default('s3cret') }}"
    roles:
      - roleName: readWrite
        databaseName: app
ipAccessList:
  - cidrBlock: 10.0.0.0/8
settings:
  overrideAtlasUserRole: "{{ role | default('GROUP_READ_ONLY') }}"
"#;

pub const LARGE: &str = r#"name: large
project:
  orgId: org-a
cluster:
  name: renamed-by-template
  diskSizeGB: 100
  providerSettings:
    providerName: AWS
    regionName: US_EAST_1
    instanceSizeName: M30
"#;

pub const TEAM: &str = r#"name: team
project:
  name: "{{ instance_id }}"
  orgId: org-a
cluster:
  providerSettings:
    providerName: AWS
    instanceSizeName: M10
databaseUsers:
  - username: reader
    password: r3ader
    roles:
      - roleName: read
        databaseName: app
  - username: writer
    password: wr1ter
    roles:
      - roleName: readWrite
        databaseName: app
"#;

pub const NO_CLUSTER: &str = "name: no-cluster\nproject:\n  orgId: org-a\n";

pub const NO_PROJECT: &str = r#"name: no-project
cluster:
  providerSettings:
    providerName: AWS
    instanceSizeName: M10
"#;

pub fn basic_plan() -> String {
    plan_id_for("basic")
}

/// Instance store wrapper with switchable failures and call counters.
#[derive(Default)]
pub struct FlakyStore {
    inner: MemoryInstanceStore,
    pub fail_put: AtomicBool,
    pub fail_delete: AtomicBool,
    fail_find_org: Mutex<Option<String>>,
    pub puts: AtomicUsize,
    pub deletes: AtomicUsize,
}

impl FlakyStore {
    pub fn fail_find_in(&self, org_id: &str) {
        *self.fail_find_org.lock().unwrap() = Some(org_id.to_string());
    }

    pub fn puts(&self) -> usize {
        self.puts.load(Ordering::SeqCst)
    }

    pub fn deletes(&self) -> usize {
        self.deletes.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl InstanceStore for FlakyStore {
    async fn put(
        &self,
        org_id: &str,
        instance_id: &str,
        record: &InstanceRecord,
    ) -> Result<String, StoreError> {
        self.puts.fetch_add(1, Ordering::SeqCst);
        if self.fail_put.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("put refused".to_string()));
        }
        self.inner.put(org_id, instance_id, record).await
    }

    async fn find_one(
        &self,
        org_id: &str,
        instance_id: &str,
    ) -> Result<Option<InstanceRecord>, StoreError> {
        let failing = self.fail_find_org.lock().unwrap().clone();
        if failing.as_deref() == Some(org_id) {
            return Err(StoreError::Backend("partition unavailable".to_string()));
        }
        self.inner.find_one(org_id, instance_id).await
    }

    async fn delete_one(&self, org_id: &str, instance_id: &str) -> Result<bool, StoreError> {
        self.deletes.fetch_add(1, Ordering::SeqCst);
        if self.fail_delete.load(Ordering::SeqCst) {
            return Err(StoreError::Backend("delete refused".to_string()));
        }
        self.inner.delete_one(org_id, instance_id).await
    }
}

pub struct Harness {
    pub api: Arc<InMemoryClusterApi>,
    pub store: Arc<FlakyStore>,
    pub orchestrator: Orchestrator,
}

pub fn harness() -> Harness {
    let mut registry = TemplateRegistry::new();
    for (name, source) in [
        ("basic", BASIC),
        ("large", LARGE),
        ("team", TEAM),
        ("no-cluster", NO_CLUSTER),
        ("no-project", NO_PROJECT),
    ] {
        registry.register(PlanTemplate::new(name, source)).unwrap();
    }

    let mut credentials = CredentialsConfig::default();
    for org in ["org-b", "org-a"] {
        credentials.orgs.insert(
            org.to_string(),
            OrgCredentials {
                public_key: format!("{}-public", org),
                private_key: format!("{}-private", org),
                display_name: None,
            },
        );
    }

    let resolver = Arc::new(PlanResolver::new(registry, injected_values(&credentials)));
    let api = Arc::new(InMemoryClusterApi::new());
    let store = Arc::new(FlakyStore::default());
    let orchestrator = Orchestrator::new(
        resolver,
        api.clone(),
        store.clone(),
        credentials.org_ids().map(str::to_string),
        DASHBOARD,
    );

    Harness {
        api,
        store,
        orchestrator,
    }
}

pub fn provision_details(plan_id: &str, parameters: Value) -> ProvisionDetails {
    ProvisionDetails {
        service_id: "meridian-service-template".to_string(),
        plan_id: plan_id.to_string(),
        raw_parameters: Some(parameters),
        raw_context: None,
    }
}
