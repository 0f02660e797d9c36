// src/handlers.rs

pub mod admin;
pub mod crm;
pub mod whatsapp;
