// src/lib.rs

pub mod entities {
    pub mod prelude;
    pub mod subscriptions;
}

pub mod models {
    pub mod product;
    pub mod report;
}

pub mod services {
    pub mod catalog_store;
    pub mod email;
    pub mod history_store;
    pub mod notifier;
}

pub mod scrapers;

pub mod jobs {
    pub mod price_check;
}
