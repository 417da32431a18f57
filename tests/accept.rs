//! Hub-side admission of CSR and IAM clusters

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::{provisioner, FakeEks, FakeHub, FakeIam, FakeMapper, HUB_ACCOUNT};
use ocm_trust::admission::AdmissionOrchestrator;
use ocm_trust::config::{AcceptConfig, UnjoinConfig};
use ocm_trust::csr::{csr_state, CsrState};
use ocm_trust::hub::{HubApi, AWS_AUTH_CONFIGMAP, AWS_AUTH_NAMESPACE};
use ocm_trust::identity::TrustVariant;
use ocm_trust::tags::is_managed;
use ocm_trust::{
    Error, HUB_ACCOUNT_ANNOTATION, HUB_EKS_CLUSTER_ANNOTATION, HUB_REGION_ANNOTATION,
    HUB_ROLE_ANNOTATION, WORKER_ROLE_ANNOTATION,
};

fn config(clusters: &[&str]) -> AcceptConfig {
    AcceptConfig::new(clusters.iter().map(|c| c.to_string()).collect())
}

fn csr_only(hub: Arc<FakeHub>) -> AdmissionOrchestrator {
    AdmissionOrchestrator::new(hub, Arc::new(FakeMapper::default()), None)
}

#[tokio::test]
async fn csr_cluster_is_approved_and_accepted() {
    let hub = Arc::new(
        FakeHub::default()
            .with_managed_cluster("c1", &[])
            .with_bootstrap_csr("csr-c1", "c1"),
    );

    let accepted = csr_only(hub.clone())
        .accept_all(&config(&["c1"]))
        .await
        .unwrap();

    assert_eq!(accepted, vec!["c1"]);
    assert_eq!(hub.approvals(), vec!["csr-c1"]);
    assert!(hub.managed_cluster("c1").unwrap().is_accepted());

    let csrs = hub.list_csrs("c1").await.unwrap();
    assert_eq!(csr_state(&csrs[0]), CsrState::Approved);
}

#[tokio::test]
async fn second_accept_does_not_reapprove() {
    let hub = Arc::new(
        FakeHub::default()
            .with_managed_cluster("c1", &[])
            .with_bootstrap_csr("csr-c1", "c1"),
    );
    let orchestrator = csr_only(hub.clone());

    orchestrator.accept_all(&config(&["c1"])).await.unwrap();
    orchestrator.accept_all(&config(&["c1"])).await.unwrap();

    assert_eq!(hub.approvals().len(), 1);
    assert_eq!(hub.accepts().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn wait_mode_without_csr_times_out() {
    let hub = Arc::new(FakeHub::default().with_managed_cluster("c1", &[]));

    let mut cfg = config(&["c1"]);
    cfg.wait = true;
    cfg.timeout = Duration::from_secs(10);

    let err = csr_only(hub.clone()).accept_all(&cfg).await.unwrap_err();
    assert!(matches!(err, Error::Timeout { timeout_secs: 10, .. }));
    assert!(hub.approvals().is_empty());
}

#[tokio::test]
async fn dry_run_accept_mutates_nothing() {
    let hub = Arc::new(
        FakeHub::default()
            .with_managed_cluster("c1", &[])
            .with_bootstrap_csr("csr-c1", "c1"),
    );
    let mut cfg = config(&["c1"]);
    cfg.dry_run = true;

    csr_only(hub.clone()).accept_all(&cfg).await.unwrap();

    assert!(hub.approvals().is_empty());
    assert!(hub.accepts().is_empty());
    assert!(!hub.managed_cluster("c1").unwrap().is_accepted());
}

#[tokio::test]
async fn iam_cluster_gets_hub_role_mapping_and_annotations() {
    let worker_role = "arn:aws:iam::222222222222:role/ocm.worker.c1";
    let hub = Arc::new(
        FakeHub::default()
            .with_managed_cluster("c1", &[(WORKER_ROLE_ANNOTATION, worker_role)])
            .with_config_map(AWS_AUTH_NAMESPACE, AWS_AUTH_CONFIGMAP),
    );
    let iam = Arc::new(FakeIam::new(HUB_ACCOUNT));
    let eks = FakeEks::default().with_cluster("hub-eks", HUB_ACCOUNT, "eu-west-1", None);
    let mapper = Arc::new(FakeMapper::default());

    let orchestrator = AdmissionOrchestrator::new(
        hub.clone(),
        mapper.clone(),
        Some(Arc::new(provisioner(iam.clone(), HUB_ACCOUNT, eks))),
    );
    let mut cfg = config(&["c1"]);
    cfg.hub_eks_cluster_name = Some("hub-eks".to_string());

    orchestrator.accept_all(&cfg).await.unwrap();

    let role = iam.role("ocm.hub.c1").expect("hub role created");
    assert!(is_managed(&role.tags));
    assert_eq!(
        mapper.mappings(),
        vec![(
            "arn:aws:iam::111111111111:role/ocm.hub.c1".to_string(),
            vec!["system:open-cluster-management:c1".to_string()]
        )]
    );

    let mc = hub.managed_cluster("c1").unwrap();
    assert!(mc.is_accepted());
    assert_eq!(
        mc.annotation(HUB_ROLE_ANNOTATION),
        Some("arn:aws:iam::111111111111:role/ocm.hub.c1")
    );
    assert_eq!(mc.annotation(HUB_EKS_CLUSTER_ANNOTATION), Some("hub-eks"));
    assert_eq!(mc.annotation(HUB_REGION_ANNOTATION), Some("eu-west-1"));
    assert_eq!(mc.annotation(HUB_ACCOUNT_ANNOTATION), Some(HUB_ACCOUNT));
    assert_eq!(mc.annotation(WORKER_ROLE_ANNOTATION), Some(worker_role));
    assert!(hub.approvals().is_empty());
}

#[tokio::test(start_paused = true)]
async fn wait_mode_provisions_iam_cluster_once_across_polls() {
    let worker_role = "arn:aws:iam::222222222222:role/ocm.worker.c1";
    // Read 1 starts the first attempt; read 2 is its record update, which
    // finds nothing and sends the poll round again.
    let hub = Arc::new(
        FakeHub::default()
            .with_managed_cluster("c1", &[(WORKER_ROLE_ANNOTATION, worker_role)])
            .with_config_map(AWS_AUTH_NAMESPACE, AWS_AUTH_CONFIGMAP)
            .with_record_missing_on_read(2),
    );
    let iam = Arc::new(FakeIam::new(HUB_ACCOUNT));
    let eks = FakeEks::default().with_cluster("hub-eks", HUB_ACCOUNT, "eu-west-1", None);
    let mapper = Arc::new(FakeMapper::default());

    let orchestrator = AdmissionOrchestrator::new(
        hub.clone(),
        mapper.clone(),
        Some(Arc::new(provisioner(iam.clone(), HUB_ACCOUNT, eks))),
    );
    let mut cfg = config(&["c1"]);
    cfg.wait = true;
    cfg.hub_eks_cluster_name = Some("hub-eks".to_string());

    let accepted = orchestrator.accept_all(&cfg).await.unwrap();
    assert_eq!(accepted, vec!["c1"]);

    let mutations = iam.mutations();
    let count = |prefix: &str| mutations.iter().filter(|m| m.starts_with(prefix)).count();
    assert_eq!(count("CreatePolicy "), 1);
    assert_eq!(count("CreateRole "), 1);
    assert_eq!(count("AttachRolePolicy "), 1);
    assert_eq!(mapper.mappings().len(), 1);

    assert_eq!(hub.accepts(), vec!["c1"]);
    let mc = hub.managed_cluster("c1").unwrap();
    assert_eq!(
        mc.annotation(HUB_ROLE_ANNOTATION),
        Some("arn:aws:iam::111111111111:role/ocm.hub.c1")
    );
}

#[tokio::test]
async fn failed_mapping_is_cleaned_up_by_hub_unjoin_and_accept_can_rerun() {
    let worker_role = "arn:aws:iam::222222222222:role/ocm.worker.c1";
    let hub = Arc::new(
        FakeHub::default()
            .with_managed_cluster("c1", &[(WORKER_ROLE_ANNOTATION, worker_role)])
            .with_config_map(AWS_AUTH_NAMESPACE, AWS_AUTH_CONFIGMAP),
    );
    let iam = Arc::new(FakeIam::new(HUB_ACCOUNT));
    let eks = || FakeEks::default().with_cluster("hub-eks", HUB_ACCOUNT, "eu-west-1", None);
    let mut cfg = config(&["c1"]);
    cfg.hub_eks_cluster_name = Some("hub-eks".to_string());

    let failing = AdmissionOrchestrator::new(
        hub.clone(),
        Arc::new(FakeMapper::failing()),
        Some(Arc::new(provisioner(iam.clone(), HUB_ACCOUNT, eks()))),
    );
    let err = failing.accept_all(&cfg).await.unwrap_err();
    let cleanup = match err {
        Error::PartialProvision { cleanup, .. } => cleanup,
        other => panic!("expected PartialProvision, got {other:?}"),
    };
    assert_eq!(
        cleanup,
        "run `ocm-trust unjoin --cluster-name c1 --delete-aws-role --hub`"
    );
    assert!(iam.role("ocm.hub.c1").is_some());

    // What `unjoin --hub` runs
    let unjoin = UnjoinConfig {
        cluster_name: "c1".to_string(),
        variant: TrustVariant::Hub,
        delete_aws_role: true,
        dry_run: false,
    };
    unjoin
        .teardown_manager(iam.clone())
        .teardown(&unjoin.cluster_name, unjoin.delete_aws_role, unjoin.dry_run)
        .await
        .unwrap();
    assert!(iam.role("ocm.hub.c1").is_none());
    assert!(iam
        .policy("arn:aws:iam::111111111111:policy/ocm.hub.c1")
        .is_none());

    let mapper = Arc::new(FakeMapper::default());
    let retry = AdmissionOrchestrator::new(
        hub.clone(),
        mapper.clone(),
        Some(Arc::new(provisioner(iam.clone(), HUB_ACCOUNT, eks()))),
    );
    retry.accept_all(&cfg).await.unwrap();
    assert!(iam.role("ocm.hub.c1").is_some());
    assert_eq!(mapper.mappings().len(), 1);
}

#[tokio::test]
async fn wait_mode_unknown_cluster_fails_without_waiting() {
    let hub = Arc::new(FakeHub::default());
    let mut cfg = config(&["typo-cluster"]);
    cfg.wait = true;

    let start = tokio::time::Instant::now();
    let err = csr_only(hub).accept_all(&cfg).await.unwrap_err();
    assert!(matches!(err, Error::ManagedClusterNotFound(ref c) if c == "typo-cluster"));
    assert!(start.elapsed() < Duration::from_secs(1));
}

#[tokio::test]
async fn iam_cluster_without_aws_auth_is_a_precondition_failure() {
    let hub = Arc::new(FakeHub::default().with_managed_cluster(
        "c1",
        &[(WORKER_ROLE_ANNOTATION, "arn:aws:iam::222222222222:role/ocm.worker.c1")],
    ));
    let iam = Arc::new(FakeIam::new(HUB_ACCOUNT));
    let eks = FakeEks::default().with_cluster("hub-eks", HUB_ACCOUNT, "eu-west-1", None);

    let orchestrator = AdmissionOrchestrator::new(
        hub.clone(),
        Arc::new(FakeMapper::default()),
        Some(Arc::new(provisioner(iam.clone(), HUB_ACCOUNT, eks))),
    );
    let mut cfg = config(&["c1"]);
    cfg.hub_eks_cluster_name = Some("hub-eks".to_string());

    let err = orchestrator.accept_all(&cfg).await.unwrap_err();
    assert!(matches!(err, Error::Precondition(_)));
    assert!(iam.mutations().is_empty());
    assert!(!hub.managed_cluster("c1").unwrap().is_accepted());
}

#[tokio::test]
async fn batch_stops_at_first_failing_cluster() {
    let hub = Arc::new(
        FakeHub::default()
            .with_managed_cluster("c1", &[])
            .with_managed_cluster("c2", &[])
            .with_bootstrap_csr("csr-c2", "c2"),
    );

    let err = csr_only(hub.clone())
        .accept_all(&config(&["c1", "c2"]))
        .await
        .unwrap_err();
    assert!(matches!(err, Error::NoCsrToApprove(ref c) if c == "c1"));
    assert!(hub.approvals().is_empty());
    assert!(!hub.managed_cluster("c2").unwrap().is_accepted());
}
