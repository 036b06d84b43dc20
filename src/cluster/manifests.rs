//! Manifests applied to every new cluster.
//!
//! Order matters: namespace and service account, then secrets and config,
//! then RBAC, then the controller workloads and their load balancer.

/// One bootstrap manifest
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Manifest {
    /// Banner shown before this manifest, if it starts a new group
    pub section: Option<&'static str>,
    /// Short description
    pub label: &'static str,
    /// Manifest URL passed to `kubectl apply -f`
    pub url: &'static str,
}

/// Dashboard first, then the NGINX ingress controller
pub const BOOTSTRAP_MANIFESTS: &[Manifest] = &[
    Manifest {
        section: Some("Installing Kubernetes cluster dashboard"),
        label: "dashboard",
        url: "https://raw.githubusercontent.com/kubernetes/dashboard/v2.0.0-beta1/aio/deploy/recommended.yaml",
    },
    Manifest {
        section: Some("Installing the Ingress Controller"),
        label: "ingress namespace and service account",
        url: "https://raw.githubusercontent.com/nginxinc/kubernetes-ingress/master/deployments/common/ns-and-sa.yaml",
    },
    Manifest {
        section: None,
        label: "ingress default server secret",
        url: "https://raw.githubusercontent.com/nginxinc/kubernetes-ingress/master/deployments/common/default-server-secret.yaml",
    },
    Manifest {
        section: None,
        label: "ingress config map",
        url: "https://raw.githubusercontent.com/gshaw1997/stagely/master/deployments/nginx-config.yaml",
    },
    Manifest {
        section: None,
        label: "ingress RBAC",
        url: "https://raw.githubusercontent.com/nginxinc/kubernetes-ingress/master/deployments/rbac/rbac.yaml",
    },
    Manifest {
        section: None,
        label: "ingress deployment",
        url: "https://raw.githubusercontent.com/nginxinc/kubernetes-ingress/master/deployments/deployment/nginx-ingress.yaml",
    },
    Manifest {
        section: None,
        label: "ingress daemon set",
        url: "https://raw.githubusercontent.com/nginxinc/kubernetes-ingress/master/deployments/daemon-set/nginx-ingress.yaml",
    },
    Manifest {
        section: None,
        label: "ingress load balancer",
        url: "https://raw.githubusercontent.com/nginxinc/kubernetes-ingress/master/deployments/service/loadbalancer-aws-elb.yaml",
    },
];
