mod kubernetes_tests;
mod static_tests;
