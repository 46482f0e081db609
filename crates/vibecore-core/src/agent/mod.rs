pub mod runner;
pub mod sub_agent;

pub use runner::{AgentRunner, RunnerError, SubAgentRunnerAdapter};
pub use sub_agent::{SubAgentExecutor, SubAgentSupervisor};
