//! Shared helpers for integration tests: local origin repositories and an
//! offline client configuration.

#![allow(dead_code)]

use git2::{BranchType, IndexAddOption, Repository, RepositoryInitOptions, Signature};
use repograph::Config;
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A git repository on disk that the client clones through its path
pub struct Origin {
    pub path: PathBuf,
}

impl Origin {
    pub fn init(path: &Path) -> Self {
        let mut options = RepositoryInitOptions::new();
        options.initial_head("main");
        Repository::init_opts(path, &options).unwrap();
        Self {
            path: path.to_path_buf(),
        }
    }

    pub fn url(&self) -> String {
        self.path.to_string_lossy().to_string()
    }

    fn repo(&self) -> Repository {
        Repository::open(&self.path).unwrap()
    }

    pub fn write(&self, rel: &str, content: &str) {
        let path = self.path.join(rel);
        fs::create_dir_all(path.parent().unwrap()).unwrap();
        fs::write(path, content).unwrap();
    }

    pub fn remove(&self, rel: &str) {
        fs::remove_file(self.path.join(rel)).unwrap();
    }

    /// Stage everything and commit on the current branch; returns the hash
    pub fn commit(&self, message: &str) -> String {
        let repo = self.repo();
        let mut index = repo.index().unwrap();
        index
            .add_all(["*"].iter(), IndexAddOption::DEFAULT, None)
            .unwrap();
        index.update_all(["*"].iter(), None).unwrap();
        index.write().unwrap();
        let tree = repo.find_tree(index.write_tree().unwrap()).unwrap();
        let sig = Signature::now("Integration", "it@example.com").unwrap();
        let parent = repo.head().ok().and_then(|h| h.peel_to_commit().ok());
        let parents: Vec<_> = parent.iter().collect();
        repo.commit(Some("HEAD"), &sig, &sig, message, &tree, &parents)
            .unwrap()
            .to_string()
    }

    /// Create a branch at the current head without switching to it
    pub fn branch(&self, name: &str) {
        let repo = self.repo();
        let head = repo.head().unwrap().peel_to_commit().unwrap();
        repo.branch(name, &head, false).unwrap();
        assert!(repo.find_branch(name, BranchType::Local).is_ok());
    }
}

/// Client configuration that needs no network and no model download
pub fn offline_config(temp: &TempDir) -> Config {
    let mut config = Config::default();
    config.graph_store.db_path = temp.path().join("graph.db");
    config.vector_index.backend = "memory".to_string();
    config.embedding.provider = "hashing".to_string();
    config.embedding.dimension = 128;
    config.indexing.workspace_root = temp.path().join("workspaces");
    config
}

pub fn workspaces_left(temp: &TempDir) -> usize {
    fs::read_dir(temp.path().join("workspaces"))
        .map(|entries| entries.count())
        .unwrap_or(0)
}

pub const ORDER_SERVICE: &str = r#"
package com.shop.orders;

import com.shop.payments.PaymentClient;

@Service
public class OrderService extends BaseService implements OrderApi {
    private final OrderRepository repository;
    private final PaymentClient payments;

    public OrderService(OrderRepository repository, PaymentClient payments) {
        this.repository = repository;
        this.payments = payments;
    }

    @Transactional
    public Order placeOrder(Cart cart) {
        Order order = Order.from(cart);
        payments.authorize(order);
        return repository.save(order);
    }

    public void cancelOrder(long id) {
        repository.delete(id);
        audit("cancel");
    }
}
"#;

pub const ORDER_API: &str = r#"
package com.shop.orders;

public interface OrderApi {
    Order placeOrder(Cart cart);
}
"#;

pub const BASE_SERVICE: &str = r#"
package com.shop.orders;

public abstract class BaseService {
    protected void audit(String action) {
    }
}
"#;

pub const PAYMENT_CLIENT: &str = r#"
package com.shop.payments;

public class PaymentClient {
    private int retries;

    public boolean authorize(Order order) {
        return send(order);
    }

    private boolean send(Order order) {
        return true;
    }
}
"#;

pub const ORDER_STATUS: &str = r#"
package com.shop.orders;

public enum OrderStatus {
    NEW,
    PAID,
    SHIPPED
}
"#;

/// Origin with the shop sources committed on `main`
pub fn shop_origin(temp: &TempDir) -> Origin {
    let origin = Origin::init(&temp.path().join("origin"));
    origin.write("src/main/java/com/shop/orders/OrderService.java", ORDER_SERVICE);
    origin.write("src/main/java/com/shop/orders/OrderApi.java", ORDER_API);
    origin.write("src/main/java/com/shop/orders/BaseService.java", BASE_SERVICE);
    origin.write("src/main/java/com/shop/orders/OrderStatus.java", ORDER_STATUS);
    origin.write("src/main/java/com/shop/payments/PaymentClient.java", PAYMENT_CLIENT);
    origin.write(
        "src/test/java/com/shop/orders/OrderServiceTest.java",
        "package com.shop.orders; class OrderServiceTest { void placesOrder() {} }",
    );
    origin.commit("initial import");
    origin
}
