pub mod pim;
