use std::sync::Arc;

use crate::execution::{ExecutionId, WorkflowId};
use crate::store::{MailSender, TemplateStore};

/// Context available to actions and logic while a node runs.
#[derive(Clone)]
pub struct StepContext {
    /// Execution being advanced.
    pub execution_id: ExecutionId,
    /// Workflow the execution belongs to.
    pub workflow_id: WorkflowId,
    /// Node being evaluated.
    pub node_id: String,
    services: StepServices,
}

/// Collaborators shared by every step.
#[derive(Clone)]
pub struct StepServices {
    pub templates: Arc<dyn TemplateStore>,
    pub mail: Arc<dyn MailSender>,
    /// Sender address for system mail.
    pub sender: String,
}

impl StepContext {
    pub fn new(
        execution_id: ExecutionId,
        workflow_id: WorkflowId,
        node_id: impl Into<String>,
        services: StepServices,
    ) -> Self {
        Self {
            execution_id,
            workflow_id,
            node_id: node_id.into(),
            services,
        }
    }

    /// Email template lookup.
    pub fn templates(&self) -> &dyn TemplateStore {
        self.services.templates.as_ref()
    }

    /// Outbound mail.
    pub fn mail(&self) -> &dyn MailSender {
        self.services.mail.as_ref()
    }

    /// Address system mail is sent from.
    pub fn sender(&self) -> &str {
        &self.services.sender
    }
}
