// src/models.rs

pub mod crm;
pub mod whatsapp;
