use super::flow_control::ControlFlow;
use uuid::Uuid;

#[derive(Debug, Clone)]
pub enum ExecutionEvent {
    Log(String),
    NodeActive(Uuid),
    NodeInactive(Uuid),
    Finished(ControlFlow),
}
