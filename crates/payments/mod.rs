pub mod vnpay_client;
