//! ocm-trust - hub/worker IAM trust provisioning and cluster admission

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use ocm_trust::admission::AdmissionOrchestrator;
use ocm_trust::config::{
    load_templates, parse_cluster_list, parse_tags, AcceptConfig, JoinConfig, UnjoinConfig,
    DEFAULT_AGENT_NAMESPACE, DEFAULT_AGENT_SERVICE_ACCOUNT,
};
use ocm_trust::hub::{AwsAuthMapper, KubeHubClient};
use ocm_trust::provider::AwsClients;
use ocm_trust::provision::TrustProvisioner;
use ocm_trust::identity::TrustVariant;
use ocm_trust::WORKER_ROLE_ANNOTATION;

/// ocm-trust - cross-account IAM trust and admission for managed clusters
#[derive(Parser, Debug)]
#[command(name = "ocm-trust", version, about, long_about = None)]
struct Cli {
    /// Validate and report without mutating anything
    #[arg(long, global = true)]
    dry_run: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Create the worker IAM role the registration agent assumes
    Join(JoinArgs),

    /// Remove the IAM role and managed policies created by join, or by accept with --hub
    Unjoin(UnjoinArgs),

    /// Accept clusters on the hub by IAM or by approving their bootstrap CSR
    Accept(AcceptArgs),
}

#[derive(Args, Debug)]
struct JoinArgs {
    /// Name the cluster is registered under on the hub
    #[arg(long)]
    cluster_name: String,

    /// Name of the worker's EKS cluster
    #[arg(long)]
    eks_cluster_name: String,

    /// AWS account the hub runs in
    #[arg(long)]
    hub_account_id: String,

    /// Namespace of the registration agent
    #[arg(long, default_value = DEFAULT_AGENT_NAMESPACE)]
    namespace: String,

    /// Service account of the registration agent
    #[arg(long, default_value = DEFAULT_AGENT_SERVICE_ACCOUNT)]
    service_account: String,

    /// AWS region, defaults to the EKS cluster's region
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Extra tags for created objects (key=value,key2=value2)
    #[arg(long, default_value = "")]
    tags: String,

    /// Directory with policy template overrides
    #[arg(long)]
    templates_dir: Option<PathBuf>,
}

#[derive(Args, Debug)]
struct UnjoinArgs {
    /// Cluster whose role is removed
    #[arg(long)]
    cluster_name: String,

    /// Delete the IAM role and its managed policies
    #[arg(long)]
    delete_aws_role: bool,

    /// Remove the hub role created by accept instead of the worker role
    #[arg(long)]
    hub: bool,
}

#[derive(Args, Debug)]
struct AcceptArgs {
    /// Comma separated cluster names
    #[arg(long)]
    clusters: String,

    /// Keep retrying until a CSR appears or the timeout elapses
    #[arg(long)]
    wait: bool,

    /// Wait mode timeout in seconds
    #[arg(long, default_value = "300")]
    timeout: u64,

    /// Approve CSRs without checking the bootstrap identity
    #[arg(long)]
    skip_approve_check: bool,

    /// Hub EKS cluster name, required for clusters registering through IAM
    #[arg(long)]
    hub_eks_cluster_name: Option<String>,

    /// AWS region of the hub
    #[arg(long, env = "AWS_REGION")]
    region: Option<String>,

    /// Extra tags for created objects (key=value,key2=value2)
    #[arg(long, default_value = "")]
    tags: String,

    /// Directory with policy template overrides
    #[arg(long)]
    templates_dir: Option<PathBuf>,

    /// Path to the hub kubeconfig
    #[arg(long, env = "KUBECONFIG")]
    kubeconfig: Option<PathBuf>,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // kube and the AWS SDK both pull in rustls; pick one process-wide provider
    if let Err(e) = rustls::crypto::aws_lc_rs::default_provider().install_default() {
        eprintln!("failed to install rustls crypto provider: {:?}", e);
        std::process::exit(1);
    }

    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_target(false))
        .init();

    let cli = Cli::parse();
    let dry_run = cli.dry_run;

    match cli.command {
        Commands::Join(args) => run_join(args, dry_run).await,
        Commands::Unjoin(args) => run_unjoin(args, dry_run).await,
        Commands::Accept(args) => run_accept(args, dry_run).await,
    }
}

async fn run_join(args: JoinArgs, dry_run: bool) -> anyhow::Result<()> {
    let config = JoinConfig {
        cluster_name: args.cluster_name,
        eks_cluster_name: args.eks_cluster_name,
        hub_account_id: args.hub_account_id,
        namespace: args.namespace,
        service_account: args.service_account,
        region: args.region,
        additional_tags: parse_tags(&args.tags)?,
        templates_dir: args.templates_dir,
        dry_run,
    };

    let templates = load_templates(config.templates_dir.as_deref())?;
    let clients = AwsClients::from_env(config.region.as_deref()).await;
    let provisioner = TrustProvisioner::from_clients(&clients, templates);

    let outcome = provisioner.join(&config.request(), config.dry_run).await?;
    println!("{}", outcome.role_arn());
    if !config.dry_run {
        println!(
            "Annotate the ManagedCluster with {}={} when registering",
            WORKER_ROLE_ANNOTATION,
            outcome.role_arn()
        );
    }
    Ok(())
}

async fn run_unjoin(args: UnjoinArgs, dry_run: bool) -> anyhow::Result<()> {
    let config = UnjoinConfig {
        cluster_name: args.cluster_name,
        variant: if args.hub {
            TrustVariant::Hub
        } else {
            TrustVariant::Worker
        },
        delete_aws_role: args.delete_aws_role,
        dry_run,
    };

    let clients = AwsClients::from_env(None).await;
    config
        .teardown_manager(clients.iam.clone())
        .teardown(&config.cluster_name, config.delete_aws_role, config.dry_run)
        .await?;
    Ok(())
}

async fn run_accept(args: AcceptArgs, dry_run: bool) -> anyhow::Result<()> {
    let config = AcceptConfig {
        clusters: parse_cluster_list(&args.clusters)?,
        wait: args.wait,
        timeout: Duration::from_secs(args.timeout),
        skip_approve_check: args.skip_approve_check,
        hub_eks_cluster_name: args.hub_eks_cluster_name,
        additional_tags: parse_tags(&args.tags)?,
        templates_dir: args.templates_dir,
        dry_run,
    };

    let hub = KubeHubClient::connect(args.kubeconfig.as_deref()).await?;
    let mapper = AwsAuthMapper::new(hub.client().clone());

    let templates = load_templates(config.templates_dir.as_deref())?;
    let clients = AwsClients::from_env(args.region.as_deref()).await;
    let provisioner = TrustProvisioner::from_clients(&clients, templates);

    let orchestrator =
        AdmissionOrchestrator::new(Arc::new(hub), Arc::new(mapper), Some(Arc::new(provisioner)));
    let accepted = orchestrator.accept_all(&config).await?;
    for cluster in accepted {
        println!("{}", cluster);
    }
    Ok(())
}
