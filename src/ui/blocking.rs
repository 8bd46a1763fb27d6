/// Blocking screen shown while the tab tree is restored from the cache

use yew::prelude::*;
use wasm_bindgen_futures::spawn_local;
use patternfly_yew::prelude::*;
use crate::bridge::{RestoreRequest, restore_in_page};

#[derive(Properties, PartialEq)]
pub struct BlockingIndicatorProps {
    pub progress: u8, // 0-100
    #[prop_or_default]
    pub message: Option<String>,
}

#[function_component(BlockingIndicator)]
pub fn blocking_indicator(props: &BlockingIndicatorProps) -> Html {
    let progress = props.progress.min(100);

    html! {
        <div class="blocking-screen">
            if let Some(msg) = &props.message {
                <p class="blocking-message">{msg}</p>
            }
            <Progress value={progress as f64} />
        </div>
    }
}

#[derive(Clone, PartialEq)]
enum RestoreState {
    Restoring(u8),
    Done,
    Failed(String),
}

#[derive(Properties, PartialEq)]
pub struct SidebarRestoreProps {
    pub request: RestoreRequest,
    /// Called with the number of restored tabs, 0 when the cache was not used
    #[prop_or_default]
    pub on_finished: Callback<usize>,
}

#[function_component(SidebarRestore)]
pub fn sidebar_restore(props: &SidebarRestoreProps) -> Html {
    let state = use_state(|| RestoreState::Restoring(0));

    // Run the restoration on mount
    {
        let state = state.clone();
        let on_finished = props.on_finished.clone();

        use_effect_with(props.request.clone(), move |request| {
            let request = request.clone();
            spawn_local(async move {
                let progress = {
                    let state = state.clone();
                    Callback::from(move |percent: u8| {
                        state.set(RestoreState::Restoring(percent));
                    })
                };

                match restore_in_page(request, None, &progress).await {
                    Ok(elements) => {
                        state.set(RestoreState::Done);
                        on_finished.emit(elements.len());
                    }
                    Err(e) => {
                        log::error!("Restoring tabs from cache failed: {}", e);
                        state.set(RestoreState::Failed(e.to_string()));
                        on_finished.emit(0);
                    }
                }
            });
            || ()
        });
    }

    match &*state {
        RestoreState::Restoring(progress) => html! {
            <BlockingIndicator progress={*progress} message={Some("Restoring tabs...".to_string())} />
        },
        RestoreState::Failed(err) => html! {
            <Alert r#type={AlertType::Danger} title={"Cache restore failed"} inline={true}>
                {err.clone()}
            </Alert>
        },
        RestoreState::Done => html! {},
    }
}
