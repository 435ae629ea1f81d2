pub mod agent_controller;
