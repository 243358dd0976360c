mod enumeration;
mod integration;
mod reconciliation;
